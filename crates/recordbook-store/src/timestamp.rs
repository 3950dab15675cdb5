//! Second-precision UTC instants with a fixed-width `YYYYMMDDHHMMSS` encoding.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Layout used for every persisted timestamp column.
pub const TIMESTAMP_LAYOUT: &str = "%Y%m%d%H%M%S";

const ENCODED_LEN: usize = 14;

/// An absolute UTC instant, truncated to whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Sub-second precision is dropped so the value survives encoding.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.trunc_subsecs(0))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn encode(&self) -> String {
        self.0.format(TIMESTAMP_LAYOUT).to_string()
    }

    pub fn decode(raw: &str) -> Result<Self, TimestampError> {
        let trimmed = raw.trim();
        if trimmed.len() != ENCODED_LEN || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TimestampError::Malformed(raw.to_string()));
        }
        let naive = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_LAYOUT)
            .map_err(|_| TimestampError::Malformed(raw.to_string()))?;
        Ok(Self(naive.and_utc()))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(at: DateTime<Utc>) -> Self {
        Self::from_datetime(at)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Timestamp {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::decode(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    #[error("malformed timestamp `{0}` (expected YYYYMMDDHHMMSS)")]
    Malformed(String),
}
