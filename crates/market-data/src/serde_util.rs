use serde::{Serialize, Serializer};

pub(crate) const NOT_AVAILABLE: &str = "N/A";

/// Serializes `None` as the literal `"N/A"` the dashboard renders verbatim.
pub(crate) fn or_na<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(value) => value.serialize(serializer),
        None => serializer.serialize_str(NOT_AVAILABLE),
    }
}

pub(crate) fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
