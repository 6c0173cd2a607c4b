use arrow::{
    array::{Array, ArrayRef, TimestampMillisecondArray},
    record_batch::RecordBatch,
};
use serde::Serialize;
use std::collections::BTreeMap;

use super::arrow::canonical_type;
use super::types::DATE;
use crate::dates::DateResolution;
use crate::error::SalesError;

/// What normalization did to the table, for logging and display.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeReport {
    /// `(from, to)` for every header that changed name.
    pub renamed: Vec<(String, String)>,
    /// Later columns that resolved to a name already taken.
    pub dropped_duplicates: Vec<String>,
    /// Derived-looking columns removed because their inputs were missing.
    pub dropped_columns: Vec<String>,
    /// Per numeric column, how many values became 0 (null or unparseable).
    pub coerced: BTreeMap<String, usize>,
    /// Null `Date` values after conversion.
    pub date_nulls: usize,
    /// Set when the date resolver ran as part of the pipeline.
    pub date_resolution: Option<DateResolution>,
}

impl NormalizeReport {
    pub fn total_coerced(&self) -> usize {
        self.coerced.values().sum()
    }
}

/// The normalized sales table. Immutable; queries work on copies of the batch.
#[derive(Debug, Clone)]
pub struct CanonicalTable {
    batch: RecordBatch,
    report: NormalizeReport,
}

impl CanonicalTable {
    pub(crate) fn new(batch: RecordBatch, report: NormalizeReport) -> Self {
        Self { batch, report }
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    pub fn report(&self) -> &NormalizeReport {
        &self.report
    }

    pub(crate) fn report_mut(&mut self) -> &mut NormalizeReport {
        &mut self.report
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// The `Date` column, when present.
    pub fn dates(&self) -> Option<&TimestampMillisecondArray> {
        self.column(DATE)?
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
    }

    /// True when `Date` exists and holds at least one value.
    pub fn has_usable_date(&self) -> bool {
        self.dates().is_some_and(|d| d.len() > d.null_count())
    }

    /// Check every column the normalizer owns against `canonical_type`.
    pub fn check_types(&self) -> anyhow::Result<()> {
        for field in self.batch.schema().fields() {
            let Some(expected) = canonical_type(field.name()) else {
                continue;
            };
            if field.data_type() != &expected {
                anyhow::bail!(
                    "column {} has type {}, expected {}",
                    field.name(),
                    field.data_type(),
                    expected
                );
            }
        }
        Ok(())
    }

    /// Fail with `DateUnresolved` unless the table has a usable `Date`.
    pub fn validate(&self) -> Result<(), SalesError> {
        if self.has_usable_date() {
            Ok(())
        } else {
            Err(SalesError::DateUnresolved)
        }
    }
}
