// src/schema/arrow.rs

use arrow::datatypes::{DataType, Field, TimeUnit};

use super::types::*;

/// The type of every resolved `Date` column: naive milliseconds.
pub fn date_type() -> DataType {
    DataType::Timestamp(TimeUnit::Millisecond, None)
}

/// Arrow type the normalizer guarantees for a canonical column it owns.
///
/// - `Date`                     → Timestamp(ms)
/// - numeric fields, margin     → Float64
/// - `Year`, `Month`            → Int32
/// - other calendar fields      → Utf8
/// - `Age_Group`                → Utf8
///
/// Returns None for pass-through columns (`Country`, `Product`, ...), whose type
/// is whatever the reader produced.
pub fn canonical_type(name: &str) -> Option<DataType> {
    match name {
        DATE => Some(date_type()),
        YEAR | MONTH => Some(DataType::Int32),
        MONTH_NAME | MONTH_YEAR | DAY_OF_WEEK | AGE_GROUP => Some(DataType::Utf8),
        PROFIT_MARGIN => Some(DataType::Float64),
        n if NUMERIC_FIELDS.contains(&n) => Some(DataType::Float64),
        _ => None,
    }
}

/// Field for a derived column. Numeric fields are non-nullable, everything
/// derived from `Date` or age is nullable.
pub fn canonical_field(name: &str, data_type: DataType) -> Field {
    let nullable = !(NUMERIC_FIELDS.contains(&name) || name == PROFIT_MARGIN);
    Field::new(name, data_type, nullable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_canonical_names() {
        assert_eq!(canonical_type("Revenue"), Some(DataType::Float64));
        assert_eq!(canonical_type("Month"), Some(DataType::Int32));
        assert_eq!(canonical_type("DayOfWeek"), Some(DataType::Utf8));
        assert_eq!(canonical_type("Date"), Some(date_type()));
        assert_eq!(canonical_type("Country"), None);
    }

    #[test]
    fn numeric_fields_are_not_nullable() {
        assert!(!canonical_field("Profit", DataType::Float64).is_nullable());
        assert!(canonical_field("Year", DataType::Int32).is_nullable());
    }
}
