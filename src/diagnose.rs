//! Offline checks for problem files: malformed-row scanning and a breakdown of
//! how the date column would be chosen.

use anyhow::{bail, Context, Result};
use arrow::{array::Array, record_batch::RecordBatch};
use csv::ReaderBuilder;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::config::DateInference;
use crate::dates::{score_columns, to_timestamp_column, ColumnDateScore};
use crate::schema::types::DATE;

const SAMPLE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BadRowReason {
    UnbalancedQuotes,
    FieldCount(usize),
    ParseError(String),
}

impl fmt::Display for BadRowReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BadRowReason::UnbalancedQuotes => write!(f, "unbalanced quotes"),
            BadRowReason::FieldCount(n) => write!(f, "fields={}", n),
            BadRowReason::ParseError(e) => write!(f, "parse error: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadRow {
    /// 1-based line number; the header is line 1.
    pub line: usize,
    pub reason: BadRowReason,
    /// Start of the raw line.
    pub sample: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MalformedScan {
    pub header_fields: usize,
    pub rows_scanned: usize,
    /// Every bad row, including those not listed.
    pub total_bad: usize,
    /// The first `limit` bad rows.
    pub bad_rows: Vec<BadRow>,
}

/// Check every physical line after the header against the header width.
///
/// Lines are inspected one at a time, so a quoted field spanning lines shows up
/// as unbalanced quotes rather than being stitched together.
pub fn scan_malformed(bytes: &[u8], limit: usize) -> Result<MalformedScan> {
    let text = String::from_utf8_lossy(bytes);
    let mut lines = text.lines().enumerate();

    let header_fields = match lines.next() {
        Some((_, header)) if !header.trim().is_empty() => parse_line(header)
            .context("reading header row")?
            .len(),
        _ => bail!("empty file"),
    };

    let mut scan = MalformedScan {
        header_fields,
        ..MalformedScan::default()
    };

    for (idx, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        scan.rows_scanned += 1;

        let reason = if line.matches('"').count() % 2 == 1 {
            Some(BadRowReason::UnbalancedQuotes)
        } else {
            match parse_line(line) {
                Ok(fields) if fields.len() != header_fields => {
                    Some(BadRowReason::FieldCount(fields.len()))
                }
                Ok(_) => None,
                Err(e) => Some(BadRowReason::ParseError(e.to_string())),
            }
        };

        if let Some(reason) = reason {
            scan.total_bad += 1;
            if scan.bad_rows.len() < limit {
                scan.bad_rows.push(BadRow {
                    line: idx + 1,
                    reason,
                    sample: line.chars().take(SAMPLE_CHARS).collect(),
                });
            }
        }
    }
    Ok(scan)
}

/// Split one line into fields with the CSV quoting rules.
pub fn parse_line(line: &str) -> Result<Vec<String>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    match rdr.records().next() {
        Some(record) => Ok(record?.iter().map(str::to_string).collect()),
        None => Ok(Vec::new()),
    }
}

/// How the date column would be picked, column by column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateDiagnosis {
    /// `Date` if present, then every name matching the pattern.
    pub name_candidates: Vec<String>,
    pub scores: Vec<ColumnDateScore>,
    /// Highest sample score (first wins), if any value parsed at all.
    pub best: Option<String>,
    /// Values of `best` that parse across the whole column.
    pub best_parsed: usize,
    pub rows: usize,
}

pub fn diagnose_dates(batch: &RecordBatch, opts: &DateInference) -> Result<DateDiagnosis> {
    let pattern = Regex::new(&opts.name_pattern)
        .with_context(|| format!("compiling date name pattern {:?}", opts.name_pattern))?;
    let schema = batch.schema();
    let mut name_candidates: Vec<String> = Vec::new();
    if schema.fields().iter().any(|f| f.name() == DATE) {
        name_candidates.push(DATE.to_string());
    }
    for f in schema.fields() {
        if pattern.is_match(f.name()) && !name_candidates.contains(f.name()) {
            name_candidates.push(f.name().clone());
        }
    }

    let scores = score_columns(batch, opts)?;
    let mut best: Option<&ColumnDateScore> = None;
    for s in &scores {
        if s.parsed > best.map_or(0, |b| b.parsed) {
            best = Some(s);
        }
    }

    let (best, best_parsed) = match best {
        Some(s) => {
            let converted = to_timestamp_column(batch.column(s.index))?;
            (Some(s.name.clone()), converted.len() - converted.null_count())
        }
        None => (None, 0),
    };

    Ok(DateDiagnosis {
        name_candidates,
        scores,
        best,
        best_parsed,
        rows: batch.num_rows(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RawTable;

    #[test]
    fn finds_field_count_and_quote_problems() -> Result<()> {
        let data = b"a,b,c\n1,2,3\n1,2\n\"open,2,3\n1,\"x,y\",3\n\n4,5,6,7\n";
        let scan = scan_malformed(data, 10)?;
        assert_eq!(scan.header_fields, 3);
        assert_eq!(scan.rows_scanned, 5);
        assert_eq!(scan.total_bad, 3);
        let summary: Vec<(usize, BadRowReason)> = scan
            .bad_rows
            .iter()
            .map(|b| (b.line, b.reason.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (3, BadRowReason::FieldCount(2)),
                (4, BadRowReason::UnbalancedQuotes),
                (7, BadRowReason::FieldCount(4)),
            ]
        );
        Ok(())
    }

    #[test]
    fn limit_caps_listing_but_not_count() -> Result<()> {
        let data = b"a,b\n1\n2\n3\n";
        let scan = scan_malformed(data, 2)?;
        assert_eq!(scan.bad_rows.len(), 2);
        assert_eq!(scan.total_bad, 3);
        Ok(())
    }

    #[test]
    fn empty_file_is_an_error() {
        assert!(scan_malformed(b"", 5).is_err());
    }

    #[test]
    fn date_diagnosis_lists_candidates_and_best() -> Result<()> {
        let raw = RawTable::new(
            vec!["id".into(), "ship_time".into(), "ordered".into()],
            vec![
                vec!["1".into(), "later".into(), "2024-01-01".into()],
                vec!["2".into(), "".into(), "2024-01-02".into()],
                vec!["3".into(), "soon".into(), "nope".into()],
            ],
        );
        let d = diagnose_dates(&raw.to_record_batch()?, &DateInference::default())?;
        assert_eq!(d.name_candidates, vec!["ship_time"]);
        assert_eq!(d.best.as_deref(), Some("ordered"));
        assert_eq!(d.best_parsed, 2);
        assert_eq!(d.rows, 3);
        assert_eq!(d.scores[1].sampled, 2);
        Ok(())
    }
}
