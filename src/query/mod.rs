//! Filters and aggregates over a canonical (or already filtered) batch.
//! Every function works on a copy; missing columns give empty results.

pub mod aggregate;
pub mod filter;

pub use aggregate::{
    monthly_series, nested_sum, pivot_sum, sum_by, top_n, GroupTotal, Kpis, NestedTotal, Pivot,
};
pub use filter::{FilterChoices, SalesFilter};

use anyhow::{Context, Result};
use arrow::{
    array::{Float64Array, StringArray, TimestampMillisecondArray},
    compute::cast,
    datatypes::DataType,
    record_batch::RecordBatch,
};

use crate::schema::types::DATE;

/// A column rendered as text, or None if the batch lacks it.
pub(crate) fn text_column(batch: &RecordBatch, name: &str) -> Result<Option<StringArray>> {
    let Some(arr) = batch.column_by_name(name) else {
        return Ok(None);
    };
    crate::dates::resolve::as_text(arr)
        .with_context(|| format!("reading {} as text", name))
        .map(Some)
}

/// A column as Float64 (nulls kept), or None if the batch lacks it.
pub(crate) fn float_column(batch: &RecordBatch, name: &str) -> Result<Option<Float64Array>> {
    let Some(arr) = batch.column_by_name(name) else {
        return Ok(None);
    };
    let floats = cast(arr.as_ref(), &DataType::Float64)
        .with_context(|| format!("casting {} to Float64", name))?;
    Ok(floats.as_any().downcast_ref::<Float64Array>().cloned())
}

pub(crate) fn date_column(batch: &RecordBatch) -> Option<&TimestampMillisecondArray> {
    batch
        .column_by_name(DATE)?
        .as_any()
        .downcast_ref::<TimestampMillisecondArray>()
}
