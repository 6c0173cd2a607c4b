use anyhow::{Context, Result};
use arrow::{
    array::{Array, BooleanArray, Int32Array},
    compute::{cast, filter_record_batch},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use super::{date_column, text_column};
use crate::schema::{types::*, CanonicalTable};

/// Distinct values offered to the user for each filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterChoices {
    pub years: Vec<i32>,
    pub countries: Vec<String>,
    pub categories: Vec<String>,
    pub date_min: Option<NaiveDate>,
    pub date_max: Option<NaiveDate>,
}

impl FilterChoices {
    pub fn from_table(table: &CanonicalTable) -> Result<Self> {
        Self::from_batch(table.batch())
    }

    /// Sorted distinct values; absent columns give empty choices.
    pub fn from_batch(batch: &RecordBatch) -> Result<Self> {
        let years = match year_column(batch)? {
            Some(years) => years
                .iter()
                .flatten()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            None => Vec::new(),
        };

        let distinct = |name: &str| -> Result<Vec<String>> {
            Ok(match text_column(batch, name)? {
                Some(col) => col
                    .iter()
                    .flatten()
                    .map(str::to_string)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect(),
                None => Vec::new(),
            })
        };

        let mut date_min = None;
        let mut date_max = None;
        if let Some(dates) = date_column(batch) {
            for d in (0..dates.len())
                .filter(|&i| dates.is_valid(i))
                .filter_map(|i| dates.value_as_datetime(i))
                .map(|dt| dt.date())
            {
                date_min = Some(date_min.map_or(d, |m: NaiveDate| m.min(d)));
                date_max = Some(date_max.map_or(d, |m: NaiveDate| m.max(d)));
            }
        }

        Ok(Self {
            years,
            countries: distinct(COUNTRY)?,
            categories: distinct(PRODUCT_CATEGORY)?,
            date_min,
            date_max,
        })
    }
}

/// User-selected filter criteria. Empty lists and `None` bounds match all rows,
/// as do criteria on columns the table does not have.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesFilter {
    pub years: Vec<i32>,
    pub countries: Vec<String>,
    pub categories: Vec<String>,
    /// Inclusive calendar-day bounds on `Date`.
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl SalesFilter {
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
            && self.countries.is_empty()
            && self.categories.is_empty()
            && self.date_from.is_none()
            && self.date_to.is_none()
    }

    /// Return a filtered copy of `batch`.
    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let n = batch.num_rows();
        let mut keep = vec![true; n];

        if !self.years.is_empty() {
            if let Some(years) = year_column(batch)? {
                for (i, k) in keep.iter_mut().enumerate() {
                    *k &= years.is_valid(i) && self.years.contains(&years.value(i));
                }
            }
        }

        for (name, wanted) in [(COUNTRY, &self.countries), (PRODUCT_CATEGORY, &self.categories)] {
            if wanted.is_empty() {
                continue;
            }
            if let Some(col) = text_column(batch, name)? {
                for (i, k) in keep.iter_mut().enumerate() {
                    *k &= col.is_valid(i) && wanted.iter().any(|w| w == col.value(i));
                }
            }
        }

        if self.date_from.is_some() || self.date_to.is_some() {
            if let Some(dates) = date_column(batch) {
                for (i, k) in keep.iter_mut().enumerate() {
                    let day = if dates.is_valid(i) {
                        dates.value_as_datetime(i).map(|dt| dt.date())
                    } else {
                        None
                    };
                    *k &= day.is_some_and(|d| {
                        self.date_from.map_or(true, |from| d >= from)
                            && self.date_to.map_or(true, |to| d <= to)
                    });
                }
            }
        }

        let mask = BooleanArray::from(keep);
        let out = filter_record_batch(batch, &mask).context("filtering sales rows")?;
        debug!(before = n, after = out.num_rows(), "applied filter");
        Ok(out)
    }
}

fn year_column(batch: &RecordBatch) -> Result<Option<Int32Array>> {
    let Some(arr) = batch.column_by_name(YEAR) else {
        return Ok(None);
    };
    let years = cast(arr.as_ref(), &DataType::Int32).context("casting Year to Int32")?;
    Ok(years.as_any().downcast_ref::<Int32Array>().cloned())
}
