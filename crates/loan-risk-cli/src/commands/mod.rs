pub mod export;
pub mod portfolio;
pub mod reference;
