//! Request DTOs for the cache admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::MAX_KEY_LENGTH;

/// Longest TTL accepted over the API: ten years, in seconds.
pub const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

fn default_use_l1() -> bool {
    true
}

/// Request body for PUT /cache
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds (the `default` policy TTL if omitted, 0 = no expiry)
/// - `compress`: Compress large values in L2
/// - `use_l1`: Allow mirroring into L1
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub compress: bool,
    #[serde(default = "default_use_l1")]
    pub use_l1: bool,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if let Some(error) = validate_key(&self.key) {
            return Some(error);
        }
        match self.ttl {
            Some(ttl) if ttl > MAX_TTL_SECONDS => Some(format!(
                "TTL exceeds maximum of {} seconds",
                MAX_TTL_SECONDS
            )),
            _ => None,
        }
    }
}

/// Request body for POST /cache/invalidate
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    /// Glob pattern, e.g. `kw:*`
    pub pattern: String,
}

impl InvalidateRequest {
    pub fn validate(&self) -> Option<String> {
        if self.pattern.trim().is_empty() {
            return Some("Pattern cannot be empty".to_string());
        }
        None
    }
}

/// Checks a key supplied by an API client.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_request_deserialize() {
        let json = r#"{"key": "test", "value": {"title": "hello"}}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key, "test");
        assert_eq!(req.value, json!({"title": "hello"}));
        assert!(req.ttl.is_none());
        assert!(!req.compress);
        assert!(req.use_l1);
    }

    #[test]
    fn test_set_request_with_options() {
        let json = r#"{"key": "test", "value": 1, "ttl": 60, "compress": true, "use_l1": false}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.ttl, Some(60));
        assert!(req.compress);
        assert!(!req.use_l1);
    }

    #[test]
    fn test_validate_empty_key() {
        let req = SetRequest {
            key: "".to_string(),
            value: json!("test"),
            ttl: None,
            compress: false,
            use_l1: true,
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_ttl_bound() {
        let mut req = SetRequest {
            key: "k".to_string(),
            value: json!(1),
            ttl: Some(MAX_TTL_SECONDS),
            compress: false,
            use_l1: true,
        };
        assert!(req.validate().is_none());

        req.ttl = Some(184_467_440_737_095_516);
        assert!(req.validate().unwrap().contains("TTL"));
    }

    #[test]
    fn test_validate_long_key() {
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH + 1)).is_some());
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH)).is_none());
    }

    #[test]
    fn test_invalidate_request() {
        let req: InvalidateRequest = serde_json::from_str(r#"{"pattern": "kw:*"}"#).unwrap();
        assert_eq!(req.pattern, "kw:*");
        assert!(req.validate().is_none());

        let blank = InvalidateRequest {
            pattern: "  ".to_string(),
        };
        assert!(blank.validate().is_some());
    }
}
