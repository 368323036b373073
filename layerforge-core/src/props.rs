//! Helpers for `"key=value"` layer properties.

use std::str::FromStr;

use crate::error::LayerForgeError;

/// Splits a `key=value` property into a lowercased key and a trimmed value.
pub fn split_key_value(property: &str) -> Result<(String, String), LayerForgeError> {
    match property.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_lowercase(), value.trim().to_string()))
        }
        _ => Err(LayerForgeError::InvalidProperty {
            key: property.to_string(),
            value: String::new(),
            reason: "expected key=value".to_string(),
        }),
    }
}

fn parse_value<T>(key: &str, value: &str, what: &str) -> Result<T, LayerForgeError>
where
    T: FromStr,
{
    value.parse::<T>().map_err(|_| LayerForgeError::InvalidProperty {
        key: key.to_string(),
        value: value.to_string(),
        reason: format!("expected {}", what),
    })
}

pub fn parse_f32(key: &str, value: &str) -> Result<f32, LayerForgeError> {
    let parsed: f32 = parse_value(key, value, "a number")?;
    if !parsed.is_finite() {
        return Err(LayerForgeError::InvalidProperty {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a finite number".to_string(),
        });
    }
    Ok(parsed)
}

pub fn parse_u32(key: &str, value: &str) -> Result<u32, LayerForgeError> {
    parse_value(key, value, "an unsigned integer")
}

pub fn parse_u64(key: &str, value: &str) -> Result<u64, LayerForgeError> {
    parse_value(key, value, "an unsigned integer")
}

/// Accepts `true`/`false` as well as `1`/`0`.
pub fn parse_bool(key: &str, value: &str) -> Result<bool, LayerForgeError> {
    match value.to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(LayerForgeError::InvalidProperty {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
