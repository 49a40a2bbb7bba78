use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

pub mod curriculum;
pub mod learning_path;
pub mod progress;

/// Identifier columns arrive as either text (uuid) or integers depending on the table.
pub(crate) fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected identifier, got {}",
            other
        ))),
    }
}

pub(crate) fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

/// Ordering columns may be numbers, numeric strings, or missing.
pub(crate) fn de_opt_order<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(parse_order_value(
        &Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null),
    ))
}

pub(crate) fn parse_order_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|v| v.is_finite()),
        Value::String(text) if !text.trim().is_empty() => {
            text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// Writes whole values as integers so paths carry `1`, not `1.0`.
pub(crate) fn ser_opt_number<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match *value {
        Some(v) if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 => {
            serializer.serialize_i64(v as i64)
        }
        Some(v) => serializer.serialize_f64(v),
        None => serializer.serialize_none(),
    }
}

/// Finite numeric value, otherwise `None` (covers `null`, strings, NaN).
pub(crate) fn de_opt_finite<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_f64().filter(|v| v.is_finite()),
        _ => None,
    })
}
