use loan_risk_core::export::read_raw_table;
use loan_risk_core::table::RawTable;
use std::io::{self, Read};

/// Attempt to read CSV from stdin if data is being piped.
/// Returns None if stdin is a TTY (interactive) or empty.
pub fn read_stdin() -> Result<Option<RawTable>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    if buffer.trim().is_empty() {
        return Ok(None);
    }

    Ok(Some(read_raw_table(buffer.as_bytes())?))
}
