//! Key parsing for price snapshots
//!
//! Turns every `venue:exchange:pair` entry of a snapshot into a
//! [`MarketKey`]. Malformed keys are logged and skipped; they never abort
//! the batch.

use tracing::warn;
use types::errors::KeyError;
use types::market::{MarketKey, PriceSnapshot};

/// Outcome of parsing a whole snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSnapshot {
    /// Accepted entries, in snapshot key order.
    pub entries: Vec<(MarketKey, f64)>,
    /// Rejected keys with the reason they were rejected.
    pub rejected: Vec<KeyError>,
}

impl ParsedSnapshot {
    pub fn accepted_count(&self) -> usize {
        self.entries.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

/// Parse a single raw key.
pub fn parse_key(raw: &str) -> Result<MarketKey, KeyError> {
    MarketKey::parse(raw)
}

/// Parse every entry of a snapshot, dropping malformed keys with a warning.
pub fn parse_snapshot(snapshot: &PriceSnapshot) -> ParsedSnapshot {
    let mut parsed = ParsedSnapshot::default();

    for (raw, price) in snapshot.iter() {
        match parse_key(raw) {
            Ok(key) => parsed.entries.push((key, price)),
            Err(err) => {
                warn!(key = raw, error = %err, "Unexpected key format, skipping");
                parsed.rejected.push(err);
            }
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_key_is_skipped() {
        let snapshot: PriceSnapshot = [("market:binance-us:atomusd", 12.5), ("bad-key", 3.0)]
            .into_iter()
            .collect();

        let parsed = parse_snapshot(&snapshot);
        assert_eq!(parsed.accepted_count(), 1);
        assert_eq!(parsed.rejected_count(), 1);
        assert_eq!(parsed.entries[0].0.pair(), "atomusd");
        assert_eq!(parsed.entries[0].1, 12.5);
        assert_eq!(parsed.rejected[0].key(), "bad-key");
    }

    #[test]
    fn test_all_valid_keys_accepted_in_order() {
        let snapshot: PriceSnapshot = [
            ("market:kraken:ethusd", 3000.0),
            ("market:kraken:btcusd", 64000.0),
            ("market:bitstamp:btcusd", 64010.0),
        ]
        .into_iter()
        .collect();

        let parsed = parse_snapshot(&snapshot);
        let keys: Vec<String> = parsed.entries.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "market:bitstamp:btcusd",
                "market:kraken:btcusd",
                "market:kraken:ethusd",
            ]
        );
        assert!(parsed.rejected.is_empty());
    }

    #[test]
    fn test_empty_snapshot() {
        let parsed = parse_snapshot(&PriceSnapshot::new());
        assert_eq!(parsed, ParsedSnapshot::default());
    }

    #[test]
    fn test_segment_errors_reported() {
        let snapshot: PriceSnapshot = [
            ("a:b:c:d", 1.0),
            ("market::btcusd", 2.0),
            ("index:kraken:btcusd", 3.0),
        ]
        .into_iter()
        .collect();

        let parsed = parse_snapshot(&snapshot);
        assert_eq!(parsed.accepted_count(), 1);
        assert!(matches!(parsed.rejected[0], KeyError::SegmentCount { found: 4, .. }));
        assert!(matches!(parsed.rejected[1], KeyError::EmptySegment { position: 1, .. }));
    }
}
