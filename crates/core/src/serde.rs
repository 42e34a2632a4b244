//! Serde helper modules for configuration files.
//!
//! Durations are written as whole seconds so repository options stay easy to
//! edit by hand.

/// `Duration` as an integer number of seconds.
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// `Option<Duration>` as an optional number of seconds. Zero means no value.
pub mod option_duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.filter(|secs| *secs > 0).map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestStruct {
        #[serde(with = "super::duration_secs")]
        required: Duration,
        #[serde(default, with = "super::option_duration_secs")]
        optional: Option<Duration>,
    }

    #[test]
    fn test_duration_from_seconds() {
        let json = r#"{"required": 90, "optional": 30}"#;
        let result: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(result.required, Duration::from_secs(90));
        assert_eq!(result.optional, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_optional_duration_missing() {
        let json = r#"{"required": 1}"#;
        let result: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(result.optional, None);
    }

    #[test]
    fn test_optional_duration_zero_is_none() {
        let json = r#"{"required": 1, "optional": 0}"#;
        let result: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(result.optional, None);
    }

    #[test]
    fn test_duration_serializes_as_seconds() {
        let value = TestStruct {
            required: Duration::from_secs(5),
            optional: None,
        };
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"required":5,"optional":null}"#);
    }

    #[test]
    fn test_negative_duration_rejected() {
        let json = r#"{"required": -1}"#;
        let result: Result<TestStruct, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
