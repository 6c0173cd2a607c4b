use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced to whoever drives the pipeline (CLI, dashboard shell).
///
/// Schema problems never show up here: missing columns and unparseable values
/// degrade to absent columns and report entries instead.
#[derive(Debug, Error)]
pub enum SalesError {
    /// No candidate file exists and no stream was supplied.
    #[error("no sales file found (searched {} location(s))", searched.len())]
    SourceNotFound { searched: Vec<PathBuf> },

    /// Every tolerance level failed on the given source.
    #[error("could not parse {origin}: {cause}")]
    UnparseableSource { origin: String, cause: String },

    /// Data was read, but no usable `Date` column came out of it.
    #[error("no valid `Date` column found after parsing")]
    DateUnresolved,

    #[error("invalid configuration: {0}")]
    Config(String),
}
