//! Single-entry memo of the normalized book for the current source.
//!
//! Filter changes rerun only the aggregator and reducer; the normalizer
//! runs again only when the source content or the config changes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::config::NormalizerConfig;
use crate::pipeline::LoanBook;
use crate::table::RawTable;
use crate::LoanRiskResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    /// Caller-chosen identity, e.g. a file path.
    pub source: String,
    pub content_fingerprint: u64,
    pub config_fingerprint: u64,
}

impl SourceKey {
    pub fn new(source: &str, table: &RawTable, config: &NormalizerConfig) -> Self {
        Self {
            source: source.to_string(),
            content_fingerprint: fingerprint(table),
            config_fingerprint: fingerprint(config),
        }
    }
}

fn fingerprint<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Default)]
pub struct SourceCache {
    entry: Option<(SourceKey, Arc<LoanBook>)>,
    loads: u64,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached book for `key`, or build it with `load` and keep it.
    /// A failed load leaves the previous entry in place.
    pub fn get_or_load_with<F>(
        &mut self,
        key: SourceKey,
        load: F,
    ) -> LoanRiskResult<Arc<LoanBook>>
    where
        F: FnOnce() -> LoanRiskResult<LoanBook>,
    {
        if let Some((cached_key, book)) = &self.entry {
            if *cached_key == key {
                log::debug!("source cache hit for '{}'", key.source);
                return Ok(Arc::clone(book));
            }
        }

        let book = Arc::new(load()?);
        self.loads += 1;
        log::debug!("source cache loaded '{}' (load #{})", key.source, self.loads);
        self.entry = Some((key, Arc::clone(&book)));
        Ok(book)
    }

    pub fn get_or_load(
        &mut self,
        source: &str,
        table: &RawTable,
        config: &NormalizerConfig,
    ) -> LoanRiskResult<Arc<LoanBook>> {
        let key = SourceKey::new(source, table, config);
        self.get_or_load_with(key, || LoanBook::load(table, config))
    }

    /// Number of times the normalizer actually ran.
    pub fn loads(&self) -> u64 {
        self.loads
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}
