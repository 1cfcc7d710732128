//! Market keys and price snapshots
//!
//! The upstream feed identifies every price by a flat string of the form
//! `venue:exchange:pair` (e.g. `market:binance-us:atomusd`). `MarketKey` is
//! the validated form of that string; nothing past the key parser handles
//! the raw string.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::KeyError;

/// Separator between the segments of a raw market key.
pub const KEY_SEPARATOR: char = ':';

/// Number of segments in a well-formed market key.
pub const KEY_SEGMENTS: usize = 3;

/// Parsed market identifier: venue kind, exchange and trading pair.
///
/// Format: "VENUE:EXCHANGE:PAIR" (e.g., "market:kraken:btcusd")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MarketKey {
    venue_kind: String,
    exchange: String,
    pair: String,
}

impl MarketKey {
    /// Build a key from its three segments.
    pub fn new(
        venue_kind: impl Into<String>,
        exchange: impl Into<String>,
        pair: impl Into<String>,
    ) -> Result<Self, KeyError> {
        let segments = [venue_kind.into(), exchange.into(), pair.into()];
        let raw = segments.join(":");
        // Rebuilding through `parse` rejects separators hidden inside a segment
        Self::parse(&raw)
    }

    /// Parse a raw feed key.
    ///
    /// Exactly three non-empty `:`-separated segments are required.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let parts: Vec<&str> = raw.split(KEY_SEPARATOR).collect();
        if parts.len() != KEY_SEGMENTS {
            return Err(KeyError::SegmentCount {
                key: raw.to_string(),
                found: parts.len(),
            });
        }
        if let Some(position) = parts.iter().position(|p| p.is_empty()) {
            return Err(KeyError::EmptySegment {
                key: raw.to_string(),
                position,
            });
        }

        Ok(Self {
            venue_kind: parts[0].to_string(),
            exchange: parts[1].to_string(),
            pair: parts[2].to_string(),
        })
    }

    /// Venue category, e.g. "market".
    pub fn venue_kind(&self) -> &str {
        &self.venue_kind
    }

    /// Exchange name, e.g. "kraken".
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Trading pair, e.g. "btcusd".
    pub fn pair(&self) -> &str {
        &self.pair
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.venue_kind, self.exchange, self.pair)
    }
}

impl FromStr for MarketKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MarketKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MarketKey> for String {
    fn from(key: MarketKey) -> Self {
        key.to_string()
    }
}

/// One fetch worth of prices, keyed by raw market key.
///
/// Ordered so that every pass over a snapshot visits keys in the same order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSnapshot {
    prices: BTreeMap<String, f64>,
}

impl PriceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the price for a raw key.
    pub fn insert(&mut self, key: impl Into<String>, price: f64) {
        self.prices.insert(key.into(), price);
    }

    /// Price for a raw key, if present.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.prices.get(key).copied()
    }

    /// Iterate `(raw_key, price)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.prices.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for PriceSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            prices: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl From<BTreeMap<String, f64>> for PriceSnapshot {
    fn from(prices: BTreeMap<String, f64>) -> Self {
        Self { prices }
    }
}
