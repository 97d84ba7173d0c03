//! The three tools exposed over the protocol: `search_code`, `open_file`,
//! `ask_code`. Each owns its own input-parsing and shaping; this module
//! holds the small validation helpers every tool needs.

pub mod ask;
pub mod file_reader;
pub mod search;

use crate::error::CompassError;
use crate::model::ContentType;

/// Trim and bound a free-text query field to 1..500 chars.
pub fn validate_query(raw: Option<&str>) -> Result<String, CompassError> {
    let trimmed = raw.unwrap_or("").trim().to_string();
    if trimmed.is_empty() || trimmed.chars().count() > 500 {
        return Err(CompassError::bad_request("query must be 1..500 characters"));
    }
    Ok(trimmed)
}

/// Clamp an optional topK field to 1..20, defaulting when absent. Unlike the
/// File Reader's line fields, topK has no error condition: negative, zero,
/// and non-integer values are silently clamped into range rather than
/// rejected.
pub fn clamp_top_k(raw: Option<&serde_json::Value>, default: u32) -> Result<u32, CompassError> {
    let n = match raw {
        None => return Ok(default),
        Some(v) => v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)),
    };
    match n {
        None => Ok(default),
        Some(n) => Ok(n.clamp(1, 20) as u32),
    }
}

/// Validate an optional pathPrefix field: 1..200 chars, no NUL, no `..`.
pub fn validate_path_prefix(raw: Option<&str>) -> Result<Option<String>, CompassError> {
    match raw {
        None => Ok(None),
        Some(s) => {
            if s.is_empty() || s.chars().count() > 200 {
                return Err(CompassError::bad_request("pathPrefix must be 1..200 characters"));
            }
            if s.contains('\0') {
                return Err(CompassError::bad_request("pathPrefix contains NUL byte"));
            }
            if s.split('/').any(|seg| seg == "..") {
                return Err(CompassError::bad_request("pathPrefix must not contain '..' segments"));
            }
            Ok(Some(s.to_string()))
        }
    }
}

/// Parse the `vector` field: required, non-empty, all finite numbers.
pub fn validate_vector(raw: Option<&serde_json::Value>) -> Result<Vec<f64>, CompassError> {
    let arr = raw
        .and_then(|v| v.as_array())
        .ok_or_else(|| CompassError::bad_request("vector is required (no embedding fallback configured)"))?;
    if arr.is_empty() {
        return Err(CompassError::bad_request("vector must not be empty"));
    }
    let mut vector = Vec::with_capacity(arr.len());
    for entry in arr {
        let n = entry
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| CompassError::bad_request("vector entries must be finite numbers"))?;
        vector.push(n);
    }
    Ok(vector)
}

pub fn parse_content_type(raw: Option<&serde_json::Value>) -> Result<ContentType, CompassError> {
    let s = raw.and_then(|v| v.as_str());
    ContentType::parse(s).map_err(CompassError::bad_request)
}

pub fn parse_strict(raw: Option<&serde_json::Value>) -> bool {
    raw.and_then(|v| v.as_bool()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_top_k_defaults_when_absent() {
        assert_eq!(clamp_top_k(None, 10).unwrap(), 10);
    }

    #[test]
    fn clamp_top_k_clamps_negative_and_zero() {
        assert_eq!(clamp_top_k(Some(&serde_json::json!(-5)), 10).unwrap(), 1);
        assert_eq!(clamp_top_k(Some(&serde_json::json!(0)), 10).unwrap(), 1);
    }

    #[test]
    fn clamp_top_k_truncates_non_integer() {
        assert_eq!(clamp_top_k(Some(&serde_json::json!(3.9)), 10).unwrap(), 3);
    }

    #[test]
    fn clamp_top_k_clamps_above_range() {
        assert_eq!(clamp_top_k(Some(&serde_json::json!(1000)), 10).unwrap(), 20);
    }
}
