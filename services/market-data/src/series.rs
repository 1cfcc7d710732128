//! Price series query
//!
//! Fetches the raw price samples of one pair over a trailing window,
//! optionally narrowed to a single exchange. Samples come back in the order
//! the store returns them: time-ascending within each series, series in
//! store order. An empty window is an empty list, not an error.

use std::sync::Arc;

use types::observation::{tag, PriceSample, MEASUREMENT, PRICE_FIELD};
use types::window::RelativeWindow;

use crate::store::{Query, StoreError, Table, TimeSeriesStore};

pub struct SeriesQuery {
    store: Arc<dyn TimeSeriesStore>,
}

impl SeriesQuery {
    pub fn new(store: Arc<dyn TimeSeriesStore>) -> Self {
        Self { store }
    }

    /// Pipeline selecting the price observations of `pair`.
    pub fn build_query(pair: &str, exchange: Option<&str>, window: &RelativeWindow) -> Query {
        let query = Query::range(window.clone())
            .measurement(MEASUREMENT)
            .tag_eq(tag::PAIR, pair);
        let query = match exchange {
            Some(exchange) => query.tag_eq(tag::EXCHANGE, exchange),
            None => query,
        };
        query.field(PRICE_FIELD)
    }

    /// Price samples for `pair` within `window`.
    pub async fn fetch(
        &self,
        pair: &str,
        exchange: Option<&str>,
        window: &RelativeWindow,
    ) -> Result<Vec<PriceSample>, StoreError> {
        let query = Self::build_query(pair, exchange, window);
        let tables = self.store.query(&query).await?;
        Ok(reshape(&tables))
    }
}

/// Flatten result tables into samples. Rows without a timestamp are skipped.
pub fn reshape(tables: &[Table]) -> Vec<PriceSample> {
    tables
        .iter()
        .flat_map(|table| table.records.iter())
        .filter_map(|record| {
            record.time.map(|time| PriceSample {
                price: record.value,
                time,
                exchange: record.tag(tag::EXCHANGE).map(str::to_string),
            })
        })
        .collect()
}
