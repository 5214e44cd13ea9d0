//! Record type for the offline log
//!
//! Each record is one line of JSON: the caller's payload plus the wall-clock
//! time it was captured.
//!
//! ```text
//! {"data":{"msg":"hi"},"timestamp":1718000000000}
//! ```

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::current_timestamp_ms;

/// A captured payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
    /// Caller-supplied payload, stored as-is
    pub data: T,

    /// Capture time in milliseconds since the Unix epoch.
    ///
    /// Decodes leniently: a missing or non-numeric value reads as `0` and a
    /// fractional one is truncated. Only `data` decides whether a line is
    /// usable.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: i64,
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_i64()
        .or_else(|| value.as_f64().map(|ms| ms as i64))
        .unwrap_or(0))
}

impl<T> Record<T> {
    /// Capture `data` now
    pub fn new(data: T) -> Self {
        Self::with_timestamp(data, current_timestamp_ms())
    }

    /// Capture `data` with an explicit timestamp
    pub fn with_timestamp(data: T, timestamp: i64) -> Self {
        Self { data, timestamp }
    }
}

impl<T: Serialize> Record<T> {
    /// Serialize record to a single JSON line (no terminator)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl<T: DeserializeOwned> Record<T> {
    /// Deserialize a record from one line of the log.
    ///
    /// The line must be a JSON object with a `data` field. Anything else,
    /// including `{}`, arrays and bare scalars, is rejected.
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(line.trim_end_matches('\r'))?;

        match value.as_object() {
            Some(fields) if fields.contains_key("data") => serde_json::from_value(value),
            Some(_) => Err(serde_json::Error::custom("record has no data field")),
            None => Err(serde_json::Error::custom("record is not a JSON object")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_line_format() {
        let record = Record::with_timestamp(json!({"msg": "hi"}), 1_700_000_000_123);
        let line = record.to_json_line().unwrap();

        assert_eq!(line, r#"{"data":{"msg":"hi"},"timestamp":1700000000123}"#);
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_decode_line() {
        let record =
            Record::<Value>::from_json_line(r#"{"data":[1,2,3],"timestamp":5}"#).unwrap();
        assert_eq!(record.data, json!([1, 2, 3]));
        assert_eq!(record.timestamp, 5);
    }

    #[test]
    fn test_decode_tolerates_crlf() {
        let record = Record::<String>::from_json_line("{\"data\":\"x\",\"timestamp\":1}\r").unwrap();
        assert_eq!(record.data, "x");
    }

    #[test]
    fn test_degenerate_lines_rejected() {
        for line in ["{}", "[]", "42", "null", "\"data\"", r#"{"timestamp":1}"#] {
            assert!(
                Record::<Option<Value>>::from_json_line(line).is_err(),
                "accepted {line}"
            );
        }
    }

    #[test]
    fn test_timestamp_is_optional() {
        let record = Record::<String>::from_json_line(r#"{"data":"x"}"#).unwrap();
        assert_eq!(record, Record::with_timestamp("x".to_string(), 0));

        let record = Record::<String>::from_json_line(r#"{"data":"x","timestamp":17.9}"#).unwrap();
        assert_eq!(record.timestamp, 17);

        let record =
            Record::<String>::from_json_line(r#"{"data":"x","timestamp":"yesterday"}"#).unwrap();
        assert_eq!(record.timestamp, 0);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(Record::<Value>::from_json_line("!@#$@$HSS-shsgk_#$^!%(@$sfsfgsafkjal12").is_err());
        assert!(Record::<Value>::from_json_line("").is_err());
    }

    #[test]
    fn test_payload_type_mismatch_rejected() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Click {
            x: u32,
        }

        assert!(Record::<Click>::from_json_line(r#"{"data":{"x":"left"},"timestamp":1}"#).is_err());
        assert!(Record::<Click>::from_json_line(r#"{"data":{"x":3},"timestamp":1}"#).is_ok());
    }

    #[test]
    fn test_new_uses_current_time() {
        let before = current_timestamp_ms();
        let record = Record::new("payload");
        let after = current_timestamp_ms();

        assert!(record.timestamp >= before - 1000 && record.timestamp <= after + 1000);
    }
}
