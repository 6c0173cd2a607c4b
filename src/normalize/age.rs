use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, StringArray},
    compute::cast,
    datatypes::DataType,
};

/// Right-closed age buckets; anything outside (0, 120] has no group.
pub const AGE_BUCKETS: [(f64, f64, &str); 4] = [
    (0.0, 24.0, "Youth"),
    (24.0, 34.0, "Young Adults"),
    (34.0, 54.0, "Adults"),
    (54.0, 120.0, "Seniors"),
];

/// Strip everything but digits, `.` and `-`, then parse. Failure is 0.
pub fn clean_age(raw: Option<&str>) -> f64 {
    raw.and_then(|s| {
        s.chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
            .collect::<String>()
            .parse::<f64>()
            .ok()
    })
    .filter(|v| v.is_finite())
    .unwrap_or(0.0)
}

pub fn age_bucket(age: f64) -> Option<&'static str> {
    AGE_BUCKETS
        .iter()
        .find(|(lo, hi, _)| age > *lo && age <= *hi)
        .map(|(_, _, label)| *label)
}

/// `Customer_Age` as Float64 (unparseable → 0) plus its `Age_Group` labels.
pub fn bucket_ages(arr: &ArrayRef) -> Result<(Float64Array, StringArray)> {
    let text = cast(arr.as_ref(), &DataType::Utf8).context("casting ages to text")?;
    let text = text
        .as_any()
        .downcast_ref::<StringArray>()
        .context("text cast did not produce a StringArray")?;

    let ages: Float64Array = text.iter().map(|v| Some(clean_age(v))).collect();
    let groups: StringArray = ages.values().iter().map(|a| age_bucket(*a)).collect();
    Ok((ages, groups))
}
