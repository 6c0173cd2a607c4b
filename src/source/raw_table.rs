use anyhow::Result;
use arrow::{
    array::{ArrayRef, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use std::sync::Arc;

use super::utils::clean_header;

/// A table exactly as read from the CSV: no guarantees about names or cell contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Column names from the header row. May be duplicated or padded.
    pub headers: Vec<String>,
    /// Each data row, one String per header (short rows are padded with "").
    pub rows: Vec<Vec<String>>,
    /// Rows the reader dropped because they could not be aligned with the header.
    pub skipped_rows: usize,
    /// Rows kept but shorter than the header, padded with "".
    pub padded_rows: usize,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            headers,
            rows,
            skipped_rows: 0,
            padded_rows: 0,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.headers.len()
    }

    /// Strip surrounding whitespace (and a stray BOM) from every header.
    pub fn trim_headers(&mut self) {
        for h in self.headers.iter_mut() {
            let cleaned = clean_header(h);
            if cleaned != *h {
                *h = cleaned;
            }
        }
    }

    /// Column-major view as an Arrow batch of nullable Utf8 columns.
    /// Empty cells become nulls; duplicate header names are kept as-is.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let fields: Vec<Field> = self
            .headers
            .iter()
            .map(|h| Field::new(h, DataType::Utf8, true))
            .collect();

        let columns: Vec<ArrayRef> = (0..self.headers.len())
            .map(|i| {
                let col: StringArray = self
                    .rows
                    .iter()
                    .map(|row| row.get(i).map(String::as_str).filter(|s| !s.is_empty()))
                    .collect();
                Arc::new(col) as ArrayRef
            })
            .collect();

        let options = RecordBatchOptions::new().with_row_count(Some(self.rows.len()));
        RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), columns, &options)
            .map_err(Into::into)
    }
}
