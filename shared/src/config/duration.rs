//! Nanosecond encoding for service durations
//!
//! The service parses every rate and timeout as an integer count of
//! nanoseconds. These helpers keep `Duration` in Rust and convert at the
//! serde boundary.

use std::time::Duration;

/// Sentinel the service reads as "no timeout"
pub const NO_TIMEOUT: i64 = -1;

/// Convert fractional seconds into a service duration
///
/// `config_seconds(0.05)` is exactly 50 000 000 ns. Negative or NaN input
/// yields a zero duration, which config validation then rejects.
pub fn config_seconds(secs: f64) -> Duration {
    let nanos = (secs * 1_000_000_000.0).round();
    if nanos.is_nan() || nanos <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(nanos as u64)
}

/// Nanosecond count of a duration as the service encodes it
pub fn as_nanos(duration: Duration) -> Option<i64> {
    i64::try_from(duration.as_nanos()).ok()
}

/// `#[serde(with = "nanos")]` for a plain `Duration`
pub mod nanos {
    use super::as_nanos;
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let value = as_nanos(*duration)
            .ok_or_else(|| S::Error::custom(format!("duration {duration:?} overflows i64 nanoseconds")))?;
        serializer.serialize_i64(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let value = i64::deserialize(deserializer)?;
        u64::try_from(value)
            .map(Duration::from_nanos)
            .map_err(|_| D::Error::custom(format!("negative duration: {value}")))
    }
}

/// `#[serde(with = "timeout_nanos")]` for an optional timeout, `None` <-> -1
pub mod timeout_nanos {
    use super::{NO_TIMEOUT, nanos};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(timeout: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match timeout {
            None => serializer.serialize_i64(NO_TIMEOUT),
            Some(duration) => nanos::serialize(duration, serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let value = i64::deserialize(deserializer)?;
        if value == NO_TIMEOUT {
            return Ok(None);
        }
        u64::try_from(value)
            .map(|nanos| Some(Duration::from_nanos(nanos)))
            .map_err(|_| D::Error::custom(format!("negative timeout: {value} (only {NO_TIMEOUT} disables it)")))
    }
}

/// `#[serde(with = "port_string")]`: the service reads ports as strings
pub mod port_string {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(port: &u16, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&port.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid port: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_seconds_matches_service_encoding() {
        assert_eq!(config_seconds(0.05).as_nanos(), 50_000_000);
        assert_eq!(config_seconds(1.0).as_nanos(), 1_000_000_000);
        assert_eq!(config_seconds(0.000_000_001).as_nanos(), 1);
    }

    #[test]
    fn test_config_seconds_clamps_non_positive() {
        assert_eq!(config_seconds(0.0), Duration::ZERO);
        assert_eq!(config_seconds(-3.0), Duration::ZERO);
        assert_eq!(config_seconds(f64::NAN), Duration::ZERO);
    }

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Timeout {
        #[serde(with = "timeout_nanos")]
        value: Option<Duration>,
    }

    #[test]
    fn test_timeout_accepts_only_sentinel_negative() {
        let disabled: Timeout = serde_yaml::from_str("value: -1").unwrap();
        assert_eq!(disabled.value, None);
        let set: Timeout = serde_yaml::from_str("value: 30000000000").unwrap();
        assert_eq!(set.value, Some(Duration::from_secs(30)));

        let err = serde_yaml::from_str::<Timeout>("value: -5").unwrap_err();
        assert!(err.to_string().contains("negative timeout"));
    }

    #[test]
    fn test_as_nanos_overflow() {
        assert_eq!(as_nanos(Duration::from_millis(50)), Some(50_000_000));
        assert_eq!(as_nanos(Duration::MAX), None);
    }
}
