use anyhow::Result;
use arrow::{array::Array, record_batch::RecordBatch};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{float_column, text_column};
use crate::schema::types::{MONTH_YEAR, ORDER_QUANTITY, PROFIT, REVENUE};

/// Headline numbers for the current selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Kpis {
    pub rows: usize,
    pub total_revenue: f64,
    pub total_profit: f64,
    pub total_quantity: f64,
    /// Revenue per row; rows are orders.
    pub avg_order_value: f64,
}

impl Kpis {
    pub fn compute(batch: &RecordBatch) -> Result<Self> {
        let total = |name: &str| -> Result<f64> {
            Ok(float_column(batch, name)?
                .map(|c| c.iter().flatten().sum::<f64>())
                .unwrap_or(0.0))
        };
        let rows = batch.num_rows();
        let total_revenue = total(REVENUE)?;
        Ok(Self {
            rows,
            total_revenue,
            total_profit: total(PROFIT)?,
            total_quantity: total(ORDER_QUANTITY)?,
            avg_order_value: total_revenue / rows.max(1) as f64,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTotal {
    pub key: String,
    pub total: f64,
}

/// Sum `value` per distinct `group`, largest first (ties by key).
/// Rows with a null key are skipped; null values count as 0.
pub fn sum_by(batch: &RecordBatch, group: &str, value: &str) -> Result<Vec<GroupTotal>> {
    let totals = grouped(batch, group, value)?;
    let mut out: Vec<GroupTotal> = totals
        .into_iter()
        .map(|(key, total)| GroupTotal { key, total })
        .collect();
    out.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.key.cmp(&b.key)));
    Ok(out)
}

/// The `n` largest groups.
pub fn top_n(batch: &RecordBatch, group: &str, value: &str, n: usize) -> Result<Vec<GroupTotal>> {
    let mut all = sum_by(batch, group, value)?;
    all.truncate(n);
    Ok(all)
}

/// Totals per `Month_Year`, oldest first.
pub fn monthly_series(batch: &RecordBatch, value: &str) -> Result<Vec<GroupTotal>> {
    Ok(grouped(batch, MONTH_YEAR, value)?
        .into_iter()
        .map(|(key, total)| GroupTotal { key, total })
        .collect())
}

fn grouped(batch: &RecordBatch, group: &str, value: &str) -> Result<BTreeMap<String, f64>> {
    let (Some(keys), Some(values)) = (text_column(batch, group)?, float_column(batch, value)?)
    else {
        return Ok(BTreeMap::new());
    };
    let mut totals = BTreeMap::new();
    for i in 0..keys.len() {
        if keys.is_null(i) {
            continue;
        }
        let v = if values.is_valid(i) { values.value(i) } else { 0.0 };
        *totals.entry(keys.value(i).to_string()).or_insert(0.0) += v;
    }
    Ok(totals)
}

/// Zero-filled `rows × columns` matrix of summed values (heatmap data).
/// Both axes are sorted ascending, so `Month_Year` columns are chronological.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Pivot {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// `values[r][c]` belongs to `rows[r]` and `columns[c]`.
    pub values: Vec<Vec<f64>>,
}

impl Pivot {
    pub fn get(&self, row: &str, column: &str) -> Option<f64> {
        let r = self.rows.iter().position(|x| x == row)?;
        let c = self.columns.iter().position(|x| x == column)?;
        Some(self.values[r][c])
    }
}

pub fn pivot_sum(batch: &RecordBatch, rows: &str, columns: &str, value: &str) -> Result<Pivot> {
    let (Some(r), Some(c), Some(v)) = (
        text_column(batch, rows)?,
        text_column(batch, columns)?,
        float_column(batch, value)?,
    ) else {
        return Ok(Pivot::default());
    };

    let mut cells: HashMap<(String, String), f64> = HashMap::new();
    let mut row_keys = BTreeSet::new();
    let mut col_keys = BTreeSet::new();
    for i in 0..r.len() {
        if r.is_null(i) || c.is_null(i) {
            continue;
        }
        let (rk, ck) = (r.value(i).to_string(), c.value(i).to_string());
        row_keys.insert(rk.clone());
        col_keys.insert(ck.clone());
        let val = if v.is_valid(i) { v.value(i) } else { 0.0 };
        *cells.entry((rk, ck)).or_insert(0.0) += val;
    }

    let rows: Vec<String> = row_keys.into_iter().collect();
    let columns: Vec<String> = col_keys.into_iter().collect();
    let values = rows
        .iter()
        .map(|rk| {
            columns
                .iter()
                .map(|ck| cells.get(&(rk.clone(), ck.clone())).copied().unwrap_or(0.0))
                .collect()
        })
        .collect();
    Ok(Pivot {
        rows,
        columns,
        values,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NestedTotal {
    pub outer: String,
    pub inner: String,
    pub total: f64,
}

/// Two-level totals (treemap data), restricted to the `top_n` inner keys by
/// overall total. Sorted by outer key, then largest first.
pub fn nested_sum(
    batch: &RecordBatch,
    outer: &str,
    inner: &str,
    value: &str,
    top_n: usize,
) -> Result<Vec<NestedTotal>> {
    let keep: BTreeSet<String> = self::top_n(batch, inner, value, top_n)?
        .into_iter()
        .map(|g| g.key)
        .collect();
    let (Some(o), Some(n), Some(v)) = (
        text_column(batch, outer)?,
        text_column(batch, inner)?,
        float_column(batch, value)?,
    ) else {
        return Ok(Vec::new());
    };

    let mut totals: BTreeMap<(String, String), f64> = BTreeMap::new();
    for i in 0..o.len() {
        if o.is_null(i) || n.is_null(i) || !keep.contains(n.value(i)) {
            continue;
        }
        let val = if v.is_valid(i) { v.value(i) } else { 0.0 };
        *totals
            .entry((o.value(i).to_string(), n.value(i).to_string()))
            .or_insert(0.0) += val;
    }

    let mut out: Vec<NestedTotal> = totals
        .into_iter()
        .map(|((outer, inner), total)| NestedTotal {
            outer,
            inner,
            total,
        })
        .collect();
    out.sort_by(|a, b| {
        a.outer
            .cmp(&b.outer)
            .then_with(|| b.total.total_cmp(&a.total))
            .then_with(|| a.inner.cmp(&b.inner))
    });
    Ok(out)
}
