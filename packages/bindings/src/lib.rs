use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Deserialize;

use loan_risk_core::cache::SourceCache;
use loan_risk_core::cohort::GroupBy;
use loan_risk_core::config::NormalizerConfig;
use loan_risk_core::export;
use loan_risk_core::filter::{apply_filter, LoanFilter};
use loan_risk_core::pipeline::{self, LoanBook, PipelineOutput};

/// One loaded book per process; a dashboard re-filters the same upload many
/// times.
static CACHE: Mutex<Option<SourceCache>> = Mutex::new(None);

/// The cache only ever holds a fully built book, so a guard left behind by a
/// panicking caller is still safe to reuse.
fn lock_cache() -> MutexGuard<'static, Option<SourceCache>> {
    CACHE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalyzeOptions {
    /// Name identifying the upload, used as the cache key together with the
    /// table contents.
    source: String,
    config: NormalizerConfig,
    filter: LoanFilter,
    group_by: GroupBy,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExportOptions {
    config: NormalizerConfig,
    filter: LoanFilter,
    /// Comma-separated column list; empty means the default columns.
    columns: String,
}

fn parse_options<T: Default + for<'de> Deserialize<'de>>(json: &str) -> NapiResult<T> {
    if json.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(json).map_err(to_napi_error)
}

fn load_cached(
    source: &str,
    csv_text: &str,
    config: &NormalizerConfig,
) -> NapiResult<loan_risk_core::LoanRiskResult<std::sync::Arc<LoanBook>>> {
    let table = export::read_raw_table(csv_text.as_bytes()).map_err(to_napi_error)?;
    let mut guard = lock_cache();
    let cache = guard.get_or_insert_with(SourceCache::new);
    Ok(cache.get_or_load(source, &table, config))
}

/// Run the whole pipeline over CSV text. Schema problems come back as an
/// empty result with a diagnostic rather than a thrown error.
#[napi]
pub fn analyze_portfolio(csv_text: String, options_json: String) -> NapiResult<String> {
    let start = Instant::now();
    let opts: AnalyzeOptions = parse_options(&options_json)?;
    opts.config.validate().map_err(to_napi_error)?;

    let output = match load_cached(&opts.source, &csv_text, &opts.config)? {
        Ok(book) => {
            let result = pipeline::run_pipeline(&book, &opts.filter, opts.group_by);
            pipeline::envelope(&book, &opts.config, &opts.filter, opts.group_by, result, start)
        }
        Err(e) => {
            let mut out = pipeline::envelope(
                &LoanBook::default(),
                &opts.config,
                &opts.filter,
                opts.group_by,
                PipelineOutput::failed(&e),
                start,
            );
            out.warnings.push(e.to_string());
            out
        }
    };
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Filtered loan table as CSV text.
#[napi]
pub fn export_csv(csv_text: String, options_json: String) -> NapiResult<String> {
    let opts: ExportOptions = parse_options(&options_json)?;
    let columns = export::parse_columns(&opts.columns).map_err(to_napi_error)?;
    let table = export::read_raw_table(csv_text.as_bytes()).map_err(to_napi_error)?;
    let book = LoanBook::load(&table, &opts.config).map_err(to_napi_error)?;
    let loans = apply_filter(&book.loans, &opts.filter);
    export::loans_to_csv_string(&loans, &columns).map_err(to_napi_error)
}

#[napi]
pub fn risk_category_table() -> NapiResult<String> {
    serde_json::to_string(&loan_risk_core::risk::risk_category_table()).map_err(to_napi_error)
}

/// Drop the cached book so the next call re-normalizes.
#[napi]
pub fn clear_cache() -> NapiResult<()> {
    let mut guard = lock_cache();
    if let Some(cache) = guard.as_mut() {
        cache.clear();
    }
    Ok(())
}
