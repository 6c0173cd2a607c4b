use arrow::array::{Array, ArrayRef, Int32Array, StringArray, TimestampMillisecondArray};
use chrono::{Datelike, NaiveDateTime};
use std::sync::Arc;

use crate::schema::types::{DAY_OF_WEEK, MONTH, MONTH_NAME, MONTH_YEAR, YEAR};

/// Calendar columns derived from `Date`, in canonical order.
/// Every output is null exactly where the date is null.
pub fn derive_calendar(dates: &TimestampMillisecondArray) -> Vec<(&'static str, ArrayRef)> {
    let parsed: Vec<Option<NaiveDateTime>> = (0..dates.len())
        .map(|i| {
            if dates.is_null(i) {
                None
            } else {
                dates.value_as_datetime(i)
            }
        })
        .collect();

    let year: Int32Array = parsed.iter().map(|d| d.map(|d| d.year())).collect();
    let month: Int32Array = parsed.iter().map(|d| d.map(|d| d.month() as i32)).collect();
    let month_name: StringArray = parsed
        .iter()
        .map(|d| d.map(|d| d.format("%B").to_string()))
        .collect();
    let month_year: StringArray = parsed
        .iter()
        .map(|d| d.map(|d| d.format("%Y-%m").to_string()))
        .collect();
    let day_of_week: StringArray = parsed
        .iter()
        .map(|d| d.map(|d| d.format("%A").to_string()))
        .collect();

    vec![
        (YEAR, Arc::new(year) as ArrayRef),
        (MONTH, Arc::new(month) as ArrayRef),
        (MONTH_NAME, Arc::new(month_name) as ArrayRef),
        (MONTH_YEAR, Arc::new(month_year) as ArrayRef),
        (DAY_OF_WEEK, Arc::new(day_of_week) as ArrayRef),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_consistent_fields() {
        // 2024-03-15 is a Friday
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        let dates = TimestampMillisecondArray::from(vec![Some(ts), None]);
        let cols = derive_calendar(&dates);
        let names: Vec<&str> = cols.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["Year", "Month", "Month_Name", "Month_Year", "DayOfWeek"]);

        let year = cols[0].1.as_any().downcast_ref::<Int32Array>().unwrap();
        let month = cols[1].1.as_any().downcast_ref::<Int32Array>().unwrap();
        let text = |i: usize| cols[i].1.as_any().downcast_ref::<StringArray>().unwrap().clone();
        assert_eq!(year.value(0), 2024);
        assert_eq!(month.value(0), 3);
        assert_eq!(text(2).value(0), "March");
        assert_eq!(text(3).value(0), "2024-03");
        assert_eq!(text(4).value(0), "Friday");

        for (_, col) in &cols {
            assert!(col.is_null(1));
        }
    }
}
