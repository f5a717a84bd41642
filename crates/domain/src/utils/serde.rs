//! Serialization utilities for durations and backend timestamps

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Serialize a `Duration` as milliseconds (u64).
///
/// ```rust
/// use std::time::Duration;
///
/// use graphlink_domain::utils::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_millis")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::*;

    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Serialize an optional UTC instant as epoch milliseconds, the format the
/// credential endpoints use for `expires_at`.
pub mod epoch_millis {
    use super::*;

    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    pub fn serialize<S>(instant: &Option<DateTime<Utc>>, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        match instant {
            Some(at) => serializer.serialize_some(&at.timestamp_millis()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<i64>::deserialize(deserializer)? {
            Some(millis) => DateTime::<Utc>::from_timestamp_millis(millis)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {millis}"))),
            None => Ok(None),
        }
    }
}
