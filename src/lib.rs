//! salesprep: locate, read and normalize loosely-structured sales CSV exports into a
//! canonical Arrow table, plus the filters and aggregates built on top of it.

pub mod cache;
pub mod config;
pub mod dates;
pub mod diagnose;
pub mod error;
pub mod export;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod schema;
pub mod source;

pub use cache::TableCache;
pub use config::{DateInference, PipelineConfig};
pub use dates::{resolve_date_column, DateMatch, DateResolution};
pub use error::SalesError;
pub use normalize::{normalize, normalize_with};
pub use pipeline::{Pipeline, Prepared};
pub use schema::{CanonicalTable, NormalizeReport, SynonymTable};
pub use source::{LoadOutcome, LoadedSource, RawTable, Tolerance};
