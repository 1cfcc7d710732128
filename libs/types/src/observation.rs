//! Observation and analytics result types
//!
//! `Observation` is the only persisted shape: one tagged price sample in the
//! `crypto_prices` measurement. Everything else in this module is rebuilt
//! from stored observations on every query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Measurement that holds every price observation.
pub const MEASUREMENT: &str = "crypto_prices";

/// Name of the numeric field carried by every observation.
pub const PRICE_FIELD: &str = "price";

/// Tag keys attached to observations.
pub mod tag {
    /// Venue kind (first key segment). Stored as `type` for compatibility.
    pub const VENUE_KIND: &str = "type";
    pub const EXCHANGE: &str = "exchange";
    pub const PAIR: &str = "pair";
}

/// Tag set of an observation, ordered by key.
pub type Tags = BTreeMap<String, String>;

/// One durable price sample.
///
/// `timestamp` is `None` until the store assigns one at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub measurement: String,
    pub tags: Tags,
    pub price: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Observation {
    /// Look up a tag value.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Pin the observation to an explicit timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// One row of a price series query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub price: f64,
    pub time: DateTime<Utc>,
    pub exchange: Option<String>,
}

/// Volatility rank of a pair within a window.
///
/// Serialises as `"position/total"` when ranked and as `-1` when the pair
/// has no observations in the ranked set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankResult {
    /// 1-based position among `total` ranked pairs.
    Ranked { position: usize, total: usize },
    /// The pair did not appear in the window.
    Absent,
}

/// Wire value used for `RankResult::Absent`.
pub const ABSENT_RANK: i64 = -1;

impl RankResult {
    pub fn is_ranked(&self) -> bool {
        matches!(self, RankResult::Ranked { .. })
    }
}

impl fmt::Display for RankResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankResult::Ranked { position, total } => write!(f, "{}/{}", position, total),
            RankResult::Absent => write!(f, "{}", ABSENT_RANK),
        }
    }
}

impl Serialize for RankResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RankResult::Ranked { .. } => serializer.collect_str(self),
            RankResult::Absent => serializer.serialize_i64(ABSENT_RANK),
        }
    }
}

impl<'de> Deserialize<'de> for RankResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Sentinel(i64),
            Ranked(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Sentinel(ABSENT_RANK) => Ok(RankResult::Absent),
            Wire::Sentinel(other) => Err(D::Error::custom(format!("unexpected rank {}", other))),
            Wire::Ranked(s) => {
                let (position, total) = s
                    .split_once('/')
                    .ok_or_else(|| D::Error::custom(format!("malformed rank {:?}", s)))?;
                let position = position.parse().map_err(D::Error::custom)?;
                let total = total.parse().map_err(D::Error::custom)?;
                Ok(RankResult::Ranked { position, total })
            }
        }
    }
}

/// Payload returned for one analytics request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsResponse {
    pub pair: String,
    pub rank: RankResult,
    pub duration: String,
    pub prices: Vec<PriceSample>,
}
