//! Volatility rank query
//!
//! Ranks every pair observed in a window by the standard deviation of its
//! price, largest first, and reports where the requested pair lands. The
//! store does the heavy lifting (filter → stddev per pair → flatten → sort);
//! this module only builds the pipeline and scans the sorted result.
//!
//! Ties: pairs with equal stddev keep whatever order the store returns.
//! `MemoryStore` yields them in ascending pair order.

use std::sync::Arc;

use types::observation::{tag, RankResult, MEASUREMENT, PRICE_FIELD};
use types::window::RelativeWindow;

use crate::store::{Query, StdDevMode, StoreError, Table, TimeSeriesStore};

pub struct RankQuery {
    store: Arc<dyn TimeSeriesStore>,
    mode: StdDevMode,
}

impl RankQuery {
    pub fn new(store: Arc<dyn TimeSeriesStore>, mode: StdDevMode) -> Self {
        Self { store, mode }
    }

    /// Standard deviation convention used for ranking.
    pub fn mode(&self) -> StdDevMode {
        self.mode
    }

    /// Pipeline producing every pair's stddev, sorted descending.
    ///
    /// The target pair is deliberately not filtered on: it is ranked
    /// against everything else in the window.
    pub fn build_query(exchange: Option<&str>, window: &RelativeWindow, mode: StdDevMode) -> Query {
        let query = Query::range(window.clone())
            .measurement(MEASUREMENT)
            .field(PRICE_FIELD);
        let query = match exchange {
            Some(exchange) => query.tag_eq(tag::EXCHANGE, exchange),
            None => query,
        };
        query.stddev_by([tag::PAIR], mode).sort_desc()
    }

    /// Rank of `pair` within `window`.
    pub async fn compute(
        &self,
        pair: &str,
        exchange: Option<&str>,
        window: &RelativeWindow,
    ) -> Result<RankResult, StoreError> {
        let query = Self::build_query(exchange, window, self.mode);
        let tables = self.store.query(&query).await?;
        Ok(find_rank(pair, &tables))
    }
}

/// Position of the first record tagged with `pair`, counted within its table.
pub fn find_rank(pair: &str, tables: &[Table]) -> RankResult {
    for table in tables {
        if let Some(idx) = table
            .records
            .iter()
            .position(|r| r.tag(tag::PAIR) == Some(pair))
        {
            return RankResult::Ranked {
                position: idx + 1,
                total: table.len(),
            };
        }
    }
    RankResult::Absent
}
