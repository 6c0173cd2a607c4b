use anyhow::{Context, Result};
use arrow::{
    array::{Array, ArrayRef, Float64Array, Float64Builder, StringArray},
    compute::cast,
    datatypes::DataType,
};

/// Parse a currency-ish string: `$` and `,` removed, whitespace trimmed.
/// Anything unparseable, missing or non-finite is 0.
pub fn clean_numeric(raw: Option<&str>) -> f64 {
    parse_numeric(raw).unwrap_or(0.0)
}

fn parse_numeric(raw: Option<&str>) -> Option<f64> {
    let cleaned: String = raw?.chars().filter(|c| !matches!(c, '$' | ',')).collect();
    cleaned
        .trim()
        .trim_matches('"')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Coerce any column to a null-free `Float64Array`.
///
/// Returns the array and how many values had to be replaced by 0.
pub fn clean_numeric_array(arr: &ArrayRef) -> Result<(Float64Array, usize)> {
    let mut b = Float64Builder::with_capacity(arr.len());
    let mut coerced = 0usize;

    match arr.data_type() {
        dt if dt.is_numeric() => {
            let floats = cast(arr.as_ref(), &DataType::Float64)
                .context("casting numeric column to Float64")?;
            let floats = floats
                .as_any()
                .downcast_ref::<Float64Array>()
                .context("Float64 cast did not produce a Float64Array")?;
            for v in floats.iter() {
                match v.filter(|x| x.is_finite()) {
                    Some(x) => b.append_value(x),
                    None => {
                        coerced += 1;
                        b.append_value(0.0);
                    }
                }
            }
        }
        _ => {
            let text = match arr.as_any().downcast_ref::<StringArray>() {
                Some(s) => s.clone(),
                None => {
                    let casted =
                        cast(arr.as_ref(), &DataType::Utf8).context("casting column to text")?;
                    casted
                        .as_any()
                        .downcast_ref::<StringArray>()
                        .cloned()
                        .context("text cast did not produce a StringArray")?
                }
            };
            for v in text.iter() {
                match parse_numeric(v) {
                    Some(x) => b.append_value(x),
                    None => {
                        coerced += 1;
                        b.append_value(0.0);
                    }
                }
            }
        }
    }

    Ok((b.finish(), coerced))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use std::sync::Arc;

    #[test]
    fn strips_currency_and_separators() {
        assert_eq!(clean_numeric(Some("$1,234.50")), 1234.50);
        assert_eq!(clean_numeric(Some("  42 ")), 42.0);
        assert_eq!(clean_numeric(Some("-$3.25")), -3.25);
        assert_eq!(clean_numeric(Some("\"7\"")), 7.0);
    }

    #[test]
    fn garbage_is_zero() {
        assert_eq!(clean_numeric(Some("n/a")), 0.0);
        assert_eq!(clean_numeric(Some("")), 0.0);
        assert_eq!(clean_numeric(None), 0.0);
        assert_eq!(clean_numeric(Some("NaN")), 0.0);
        assert_eq!(clean_numeric(Some("inf")), 0.0);
    }

    #[test]
    fn text_array_counts_coercions() -> Result<()> {
        let arr: ArrayRef = Arc::new(StringArray::from(vec![
            Some("$10"),
            None,
            Some("oops"),
            Some("0"),
        ]));
        let (out, coerced) = clean_numeric_array(&arr)?;
        assert_eq!(out.values().to_vec(), vec![10.0, 0.0, 0.0, 0.0]);
        assert_eq!(out.null_count(), 0);
        // a literal zero is a value, not a coercion
        assert_eq!(coerced, 2);
        Ok(())
    }

    #[test]
    fn numeric_array_is_cast() -> Result<()> {
        let arr: ArrayRef = Arc::new(Int64Array::from(vec![Some(3), None]));
        let (out, coerced) = clean_numeric_array(&arr)?;
        assert_eq!(out.values().to_vec(), vec![3.0, 0.0]);
        assert_eq!(coerced, 1);
        Ok(())
    }
}
