use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parses a timestamp that is either integer milliseconds or an RFC3339 string
pub fn parse_timestamp_value(value: &Value) -> Result<DateTime<Utc>, String> {
    match value {
        Value::Number(n) => {
            let ms = n.as_i64().ok_or_else(|| "invalid timestamp".to_string())?;
            DateTime::from_timestamp_millis(ms).ok_or_else(|| "timestamp out of range".to_string())
        }
        Value::String(s) => s
            .parse::<DateTime<Utc>>()
            .map_err(|e| format!("invalid RFC3339 timestamp: {}", e)),
        _ => Err("timestamp must be a number or string".to_string()),
    }
}

/// Lenient timestamp deserializer for log records
///
/// A missing, null or unreadable timestamp becomes `None` so that the rest of
/// the record is still usable.
pub fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| parse_timestamp_value(&v).ok()))
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use crate::models::SessionRecord;

    #[test]
    fn test_record_timestamp_rfc3339() {
        let json = r#"{"type":"user","timestamp":"2025-11-02T09:41:20.016Z"}"#;
        let record: SessionRecord = serde_json::from_str(json).unwrap();
        let expected = "2025-11-02T09:41:20.016Z".parse::<DateTime<chrono::Utc>>().unwrap();
        assert_eq!(record.timestamp, Some(expected));
    }

    #[test]
    fn test_record_timestamp_millis() {
        let json = r#"{"type":"user","timestamp":1762076480016}"#;
        let record: SessionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.timestamp, DateTime::from_timestamp_millis(1762076480016));
    }

    #[test]
    fn test_record_timestamp_garbage_is_none() {
        let json = r#"{"type":"user","timestamp":"yesterday-ish"}"#;
        let record: SessionRecord = serde_json::from_str(json).unwrap();
        assert!(record.timestamp.is_none());
    }

    #[test]
    fn test_record_without_timestamp() {
        let json = r#"{"type":"summary","summary":"Notes about notes"}"#;
        let record: SessionRecord = serde_json::from_str(json).unwrap();
        assert!(record.timestamp.is_none());
        assert_eq!(record.kind, "summary");
    }
}
