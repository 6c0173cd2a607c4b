use anyhow::{Context, Result};
use arrow::{
    array::{Array, ArrayRef, StringArray, TimestampMillisecondArray},
    compute::cast,
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::date_parser::parse_timestamp_millis;
use crate::config::DateInference;
use crate::schema::{arrow::date_type, types::DATE};

/// How the date column was picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DateMatch {
    /// A column literally named `Date`.
    Exact,
    /// First column whose name matched the date/time pattern.
    NamePattern,
    /// Best-scoring column from sampling its values.
    Sampled { hits: usize, sampled: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DateResolution {
    Resolved {
        /// Name the column had before being renamed to `Date`.
        source: String,
        method: DateMatch,
        /// Non-null values after conversion.
        parsed: usize,
        /// Values that became null (including ones that were already null).
        nulls: usize,
    },
    Unresolved,
}

impl DateResolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, DateResolution::Resolved { .. })
    }
}

/// Per-column sampling result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDateScore {
    pub index: usize,
    pub name: String,
    /// Non-null values inspected (at most `sample_cap`).
    pub sampled: usize,
    /// How many of those parsed as a date/time.
    pub parsed: usize,
}

/// Render any column as optional strings (nulls stay null).
pub(crate) fn as_text(arr: &ArrayRef) -> Result<StringArray> {
    let utf8 = match arr.data_type() {
        DataType::Utf8 => arr.clone(),
        other => cast(arr.as_ref(), &DataType::Utf8)
            .with_context(|| format!("casting {} column to text", other))?,
    };
    utf8.as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .context("text cast did not produce a StringArray")
}

/// Sample up to `sample_cap` non-null values of every column and count how many
/// parse as dates.
pub fn score_columns(batch: &RecordBatch, opts: &DateInference) -> Result<Vec<ColumnDateScore>> {
    let schema = batch.schema();
    let mut scores = Vec::with_capacity(batch.num_columns());

    for (index, (field, arr)) in schema.fields().iter().zip(batch.columns()).enumerate() {
        let text = as_text(arr)?;
        let sample: Vec<&str> = text.iter().flatten().take(opts.sample_cap).collect();
        let parsed = sample
            .iter()
            .filter(|s| parse_timestamp_millis(s).is_some())
            .count();
        scores.push(ColumnDateScore {
            index,
            name: field.name().clone(),
            sampled: sample.len(),
            parsed,
        });
    }
    Ok(scores)
}

/// Pick the statistically best column, if it clears the success ratio.
/// Ties go to the earlier column.
pub fn infer_by_sampling(
    batch: &RecordBatch,
    opts: &DateInference,
) -> Result<Option<ColumnDateScore>> {
    let scores = score_columns(batch, opts)?;
    let mut best: Option<ColumnDateScore> = None;
    for score in scores {
        debug!(column = %score.name, parsed = score.parsed, sampled = score.sampled, "date sample");
        if score.sampled == 0 {
            continue;
        }
        if best.as_ref().map_or(score.parsed > 0, |b| score.parsed > b.parsed) {
            best = Some(score);
        }
    }

    Ok(best.filter(|b| {
        let required = opts.min_success_ratio * b.sampled as f64;
        let accepted = b.parsed as f64 >= required;
        if !accepted {
            debug!(column = %b.name, parsed = b.parsed, required, "best date candidate below threshold");
        }
        accepted
    }))
}

/// Choose at most one column to treat as the transaction date:
/// exact `Date`, then the first name matching the pattern, then sampling.
pub fn find_date_column(
    batch: &RecordBatch,
    opts: &DateInference,
) -> Result<Option<(usize, DateMatch)>> {
    let schema = batch.schema();
    if let Some(idx) = schema.fields().iter().position(|f| f.name() == DATE) {
        return Ok(Some((idx, DateMatch::Exact)));
    }

    let pattern = Regex::new(&opts.name_pattern)
        .with_context(|| format!("compiling date name pattern {:?}", opts.name_pattern))?;
    if let Some(idx) = schema.fields().iter().position(|f| pattern.is_match(f.name())) {
        return Ok(Some((idx, DateMatch::NamePattern)));
    }

    Ok(infer_by_sampling(batch, opts)?.map(|s| {
        (
            s.index,
            DateMatch::Sampled {
                hits: s.parsed,
                sampled: s.sampled,
            },
        )
    }))
}

/// Convert a whole column to `Timestamp(ms)`. Values that do not parse become
/// null; the conversion itself never fails on bad values.
pub fn to_timestamp_column(arr: &ArrayRef) -> Result<ArrayRef> {
    match arr.data_type() {
        DataType::Timestamp(TimeUnit::Millisecond, None) => Ok(arr.clone()),
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
            cast(arr.as_ref(), &date_type()).context("casting temporal column to timestamp")
        }
        _ => {
            let text = as_text(arr)?;
            let parsed: TimestampMillisecondArray = text
                .iter()
                .map(|v| v.and_then(parse_timestamp_millis))
                .collect();
            Ok(Arc::new(parsed) as ArrayRef)
        }
    }
}

/// Find the date column, convert it in full and rename it to `Date`.
///
/// The input batch is left untouched; when nothing qualifies the returned batch
/// is a clone and the resolution is `Unresolved`.
#[tracing::instrument(level = "debug", skip_all, fields(columns = batch.num_columns()))]
pub fn resolve_date_column(
    batch: &RecordBatch,
    opts: &DateInference,
) -> Result<(RecordBatch, DateResolution)> {
    let Some((idx, method)) = find_date_column(batch, opts)? else {
        warn!("no date column identified");
        return Ok((batch.clone(), DateResolution::Unresolved));
    };

    let schema = batch.schema();
    let source = schema.field(idx).name().clone();
    let converted = to_timestamp_column(batch.column(idx))?;
    let nulls = converted.null_count();
    let parsed = converted.len() - nulls;

    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields[idx] = Field::new(DATE, date_type(), true);
    let mut columns = batch.columns().to_vec();
    columns[idx] = converted;

    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    let out = RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), columns, &options)
        .context("rebuilding batch with Date column")?;

    info!(source = %source, ?method, parsed, nulls, "resolved date column");
    Ok((
        out,
        DateResolution::Resolved {
            source,
            method,
            parsed,
            nulls,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RawTable;
    use chrono::NaiveDate;

    fn batch(headers: &[&str], rows: &[&[&str]]) -> RecordBatch {
        RawTable::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
        .to_record_batch()
        .unwrap()
    }

    fn timestamps(batch: &RecordBatch, idx: usize) -> &TimestampMillisecondArray {
        batch
            .column(idx)
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .unwrap()
    }

    /// 500 rows in one column, `good` of which are dates; the rest are words.
    fn sampled_column(good: usize) -> RecordBatch {
        let values: Vec<String> = (0..500)
            .map(|i| {
                if i < good {
                    format!("2023-01-{:02}", i % 28 + 1)
                } else {
                    format!("item-{}", i)
                }
            })
            .collect();
        let rows: Vec<Vec<String>> = values
            .into_iter()
            .map(|v| vec![v, "12.5".to_string()])
            .collect();
        RawTable::new(vec!["when".into(), "amount".into()], rows)
            .to_record_batch()
            .unwrap()
    }

    #[test]
    fn exact_name_wins_over_pattern() -> Result<()> {
        let b = batch(&["order_date", "Date"], &[&["2024-01-01", "2024-02-02"]]);
        let (out, res) = resolve_date_column(&b, &DateInference::default())?;
        assert!(matches!(res, DateResolution::Resolved { method: DateMatch::Exact, .. }));
        assert_eq!(out.schema().field(0).name(), "order_date");
        assert_eq!(out.schema().field(1).name(), "Date");
        assert_eq!(out.schema().field(1).data_type(), &date_type());
        Ok(())
    }

    #[test]
    fn pattern_is_case_insensitive_and_first_wins() -> Result<()> {
        let b = batch(
            &["id", "Order DATE", "ship_time"],
            &[&["1", "2024-03-15", "2024-03-20"]],
        );
        let (out, res) = resolve_date_column(&b, &DateInference::default())?;
        match res {
            DateResolution::Resolved { source, method, parsed, nulls } => {
                assert_eq!(source, "Order DATE");
                assert_eq!(method, DateMatch::NamePattern);
                assert_eq!((parsed, nulls), (1, 0));
            }
            other => panic!("unexpected {:?}", other),
        }
        let names: Vec<String> = out.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, vec!["id", "Date", "ship_time"]);
        Ok(())
    }

    #[test]
    fn sixty_percent_sample_is_accepted() -> Result<()> {
        let b = sampled_column(300);
        let (out, res) = resolve_date_column(&b, &DateInference::default())?;
        assert_eq!(
            res,
            DateResolution::Resolved {
                source: "when".into(),
                method: DateMatch::Sampled { hits: 300, sampled: 500 },
                parsed: 300,
                nulls: 200,
            }
        );
        assert_eq!(out.schema().field(0).name(), "Date");
        assert!(out.schema().fields().iter().all(|f| f.name() != "when"));
        Ok(())
    }

    #[test]
    fn forty_percent_sample_is_rejected() -> Result<()> {
        let b = sampled_column(200);
        let (out, res) = resolve_date_column(&b, &DateInference::default())?;
        assert_eq!(res, DateResolution::Unresolved);
        assert!(out.schema().fields().iter().all(|f| f.name() != "Date"));
        assert_eq!(out.schema().field(0).name(), "when");
        Ok(())
    }

    #[test]
    fn threshold_is_configurable() -> Result<()> {
        let b = sampled_column(200);
        let opts = DateInference {
            min_success_ratio: 0.3,
            ..DateInference::default()
        };
        let (_, res) = resolve_date_column(&b, &opts)?;
        assert!(res.is_resolved());
        Ok(())
    }

    #[test]
    fn sample_cap_limits_inspection() -> Result<()> {
        let b = sampled_column(300);
        let opts = DateInference {
            sample_cap: 100,
            ..DateInference::default()
        };
        let scores = score_columns(&b, &opts)?;
        assert_eq!(scores[0].sampled, 100);
        assert_eq!(scores[0].parsed, 100);
        assert_eq!(scores[1].parsed, 0);
        Ok(())
    }

    #[test]
    fn leading_empty_cells_do_not_use_up_the_sample() -> Result<()> {
        // 600 empty cells, then 500 dates: the first 500 non-null values are all dates
        let rows: Vec<Vec<String>> = (0..1100)
            .map(|i| {
                let when = if i < 600 {
                    String::new()
                } else {
                    format!("2023-02-{:02}", i % 28 + 1)
                };
                vec![when, "x".to_string()]
            })
            .collect();
        let b = RawTable::new(vec!["when".into(), "note".into()], rows).to_record_batch()?;

        let scores = score_columns(&b, &DateInference::default())?;
        assert_eq!(scores[0].sampled, 500);
        assert_eq!(scores[0].parsed, 500);

        let (out, res) = resolve_date_column(&b, &DateInference::default())?;
        assert!(res.is_resolved());
        assert_eq!(timestamps(&out, 0).null_count(), 600);
        Ok(())
    }

    #[test]
    fn sampling_ties_go_to_first_column() -> Result<()> {
        let b = batch(
            &["a", "b"],
            &[&["2024-01-01", "2024-02-01"], &["2024-01-02", "2024-02-02"]],
        );
        let best = infer_by_sampling(&b, &DateInference::default())?.unwrap();
        assert_eq!(best.name, "a");
        Ok(())
    }

    #[test]
    fn whole_column_converted_with_nulls_for_garbage() -> Result<()> {
        let b = batch(&["Date"], &[&["2024-03-15"], &["not a date"], &[""]]);
        let (out, res) = resolve_date_column(&b, &DateInference::default())?;
        let ts = timestamps(&out, 0);
        assert_eq!(
            ts.value_as_datetime(0),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap().and_hms_opt(0, 0, 0)
        );
        assert!(ts.is_null(1));
        assert!(ts.is_null(2));
        assert!(matches!(res, DateResolution::Resolved { parsed: 1, nulls: 2, .. }));
        Ok(())
    }

    #[test]
    fn input_batch_is_not_mutated() -> Result<()> {
        let b = batch(&["when"], &[&["2024-01-01"]]);
        let _ = resolve_date_column(&b, &DateInference::default())?;
        assert_eq!(b.schema().field(0).name(), "when");
        assert_eq!(b.column(0).data_type(), &DataType::Utf8);
        Ok(())
    }
}
