//! Schema normalizer: raw Arrow batch in, `CanonicalTable` out.
//!
//! Steps, in order: rename via synonyms (planned up front, applied once), drop
//! duplicate names, convert `Date`, coerce numerics, derive calendar fields,
//! derive `Profit_Margin`, bucket ages. Existing columns are replaced in place;
//! new columns are appended.

pub mod age;
pub mod calendar;
pub mod convert;

pub use age::{age_bucket, clean_age};
pub use convert::{clean_numeric, clean_numeric_array};

use anyhow::{Context, Result};
use arrow::{
    array::{Array, ArrayRef, Float64Array, TimestampMillisecondArray},
    datatypes::{DataType, Field, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, info, warn};

use crate::dates::to_timestamp_column;
use crate::schema::{
    canonical_field, date_type,
    types::*,
    CanonicalTable, NormalizeReport, SynonymTable,
};

/// Normalize with the built-in synonym table.
pub fn normalize(batch: &RecordBatch) -> Result<CanonicalTable> {
    normalize_with(batch, SynonymTable::builtin())
}

/// Normalize `batch` into a new canonical table. The input is not modified.
#[tracing::instrument(level = "debug", skip_all, fields(rows = batch.num_rows(), columns = batch.num_columns()))]
pub fn normalize_with(batch: &RecordBatch, synonyms: &SynonymTable) -> Result<CanonicalTable> {
    let mut report = NormalizeReport::default();
    let mut cols = rename_columns(batch, synonyms, &mut report);

    // Date
    let dates = match cols.get(DATE) {
        Some(arr) => {
            let converted = to_timestamp_column(arr).context("converting Date column")?;
            report.date_nulls = converted.null_count();
            cols.set(Field::new(DATE, date_type(), true), converted.clone());
            converted
                .as_any()
                .downcast_ref::<TimestampMillisecondArray>()
                .cloned()
        }
        None => None,
    };

    // Numerics
    for name in NUMERIC_FIELDS {
        let Some(arr) = cols.get(name) else { continue };
        let (clean, coerced) =
            clean_numeric_array(arr).with_context(|| format!("coercing {}", name))?;
        if coerced > 0 {
            warn!(column = name, coerced, "values coerced to 0");
            report.coerced.insert(name.to_string(), coerced);
        }
        cols.set(canonical_field(name, DataType::Float64), Arc::new(clean));
    }

    // Calendar
    match &dates {
        Some(dates) => {
            for (name, arr) in calendar::derive_calendar(dates) {
                let dt = arr.data_type().clone();
                cols.set(canonical_field(name, dt), arr);
            }
        }
        None => {
            for name in CALENDAR_FIELDS {
                if cols.remove(name) {
                    report.dropped_columns.push(name.to_string());
                }
            }
        }
    }

    // Profit margin
    match (float_column(&cols, REVENUE), float_column(&cols, PROFIT)) {
        (Some(revenue), Some(profit)) => {
            let margin = profit_margin(&revenue, &profit);
            cols.set(
                canonical_field(PROFIT_MARGIN, DataType::Float64),
                Arc::new(margin),
            );
        }
        _ => {
            if cols.remove(PROFIT_MARGIN) {
                report.dropped_columns.push(PROFIT_MARGIN.to_string());
            }
        }
    }

    // Age groups, only when the input did not bring its own
    if !cols.contains(AGE_GROUP) {
        if let Some(arr) = cols.get(CUSTOMER_AGE) {
            let (ages, groups) = age::bucket_ages(arr).context("bucketing Customer_Age")?;
            cols.set(
                Field::new(CUSTOMER_AGE, DataType::Float64, true),
                Arc::new(ages),
            );
            cols.set(Field::new(AGE_GROUP, DataType::Utf8, true), Arc::new(groups));
        }
    }

    let out = cols.into_batch(batch.num_rows())?;
    let table = CanonicalTable::new(out, report);
    table.check_types()?;
    let (out, report) = (table.batch(), table.report());
    info!(
        rows = out.num_rows(),
        columns = out.num_columns(),
        renamed = report.renamed.len(),
        coerced = report.total_coerced(),
        date_nulls = report.date_nulls,
        "normalized sales table"
    );
    Ok(table)
}

/// Apply the synonym plan and keep the first column for every target name.
fn rename_columns(
    batch: &RecordBatch,
    synonyms: &SynonymTable,
    report: &mut NormalizeReport,
) -> Columns {
    let schema = batch.schema();
    let headers: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    let plan = synonyms.rename_plan(&headers);

    let mut seen = HashSet::new();
    let mut cols = Columns::default();
    for ((field, arr), target) in schema.fields().iter().zip(batch.columns()).zip(plan) {
        if !seen.insert(target.clone()) {
            debug!(column = %field.name(), target = %target, "dropping duplicate column");
            report.dropped_duplicates.push(field.name().clone());
            continue;
        }
        if field.name() != &target {
            report.renamed.push((field.name().clone(), target.clone()));
        }
        cols.fields.push(field.as_ref().clone().with_name(target));
        cols.arrays.push(arr.clone());
    }
    cols
}

fn float_column(cols: &Columns, name: &str) -> Option<Float64Array> {
    cols.get(name)?
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
}

/// `Profit / Revenue`, 0 where revenue is 0 or the quotient is not finite.
fn profit_margin(revenue: &Float64Array, profit: &Float64Array) -> Float64Array {
    revenue
        .values()
        .iter()
        .zip(profit.values().iter())
        .map(|(r, p)| {
            if *r == 0.0 {
                return Some(0.0);
            }
            let m = p / r;
            Some(if m.is_finite() { m } else { 0.0 })
        })
        .collect()
}

/// Ordered working set of columns while the batch is rebuilt.
#[derive(Default)]
struct Columns {
    fields: Vec<Field>,
    arrays: Vec<ArrayRef>,
}

impl Columns {
    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn get(&self, name: &str) -> Option<&ArrayRef> {
        self.position(name).map(|i| &self.arrays[i])
    }

    /// Replace the column with the same name, or append.
    fn set(&mut self, field: Field, arr: ArrayRef) {
        match self.position(field.name()) {
            Some(i) => {
                self.fields[i] = field;
                self.arrays[i] = arr;
            }
            None => {
                self.fields.push(field);
                self.arrays.push(arr);
            }
        }
    }

    fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(i) => {
                self.fields.remove(i);
                self.arrays.remove(i);
                true
            }
            None => false,
        }
    }

    fn into_batch(self, num_rows: usize) -> Result<RecordBatch> {
        let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
        RecordBatch::try_new_with_options(Arc::new(Schema::new(self.fields)), self.arrays, &options)
            .context("assembling canonical batch")
    }
}
