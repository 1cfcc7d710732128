//! Observation encoding
//!
//! Pure mapping from a parsed market key and its price to the record that
//! gets persisted. No I/O, no clock: the store assigns the timestamp.

use types::market::MarketKey;
use types::observation::{tag, Observation, Tags, MEASUREMENT};

/// Encode one price as an observation in the `crypto_prices` measurement.
pub fn encode(key: &MarketKey, price: f64) -> Observation {
    let tags: Tags = [
        (tag::VENUE_KIND, key.venue_kind()),
        (tag::EXCHANGE, key.exchange()),
        (tag::PAIR, key.pair()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    Observation {
        measurement: MEASUREMENT.to_string(),
        tags,
        price,
        timestamp: None,
    }
}

/// Encode a batch of parsed entries, preserving order.
pub fn encode_all<'a, I>(entries: I) -> Vec<Observation>
where
    I: IntoIterator<Item = &'a (MarketKey, f64)>,
{
    entries
        .into_iter()
        .map(|(key, price)| encode(key, *price))
        .collect()
}
