//! Date detection and parsing: find the transaction-date column and convert it.

pub mod date_parser;
pub mod resolve;

pub use date_parser::{parse_datetime, parse_timestamp_millis};
pub use resolve::{
    find_date_column, infer_by_sampling, resolve_date_column, score_columns,
    to_timestamp_column, ColumnDateScore, DateMatch, DateResolution,
};
