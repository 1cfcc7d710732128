//! Analytics facade
//!
//! Answers one `GET /{pair}` worth of questions: the pair's price series and
//! its volatility rank over the same window. Both queries run concurrently
//! against the store and either failure fails the whole request.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};
use types::observation::AnalyticsResponse;
use types::window::RelativeWindow;

use crate::rank::RankQuery;
use crate::series::SeriesQuery;
use crate::store::{StdDevMode, StoreError, TimeSeriesStore};

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("{stage} query failed: {source}")]
    StorageQuery {
        stage: &'static str,
        #[source]
        source: StoreError,
    },
}

impl AnalyticsError {
    fn series(source: StoreError) -> Self {
        Self::StorageQuery {
            stage: "series",
            source,
        }
    }

    fn rank(source: StoreError) -> Self {
        Self::StorageQuery {
            stage: "rank",
            source,
        }
    }
}

/// One analytics request. The pair is taken as given; route-level
/// validation happens in the gateway.
#[derive(Debug, Clone)]
pub struct AnalyticsRequest {
    pub pair: String,
    pub exchange: Option<String>,
    pub window: RelativeWindow,
}

impl AnalyticsRequest {
    pub fn new(pair: impl Into<String>) -> Self {
        Self {
            pair: pair.into(),
            exchange: None,
            window: RelativeWindow::default(),
        }
    }

    pub fn exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    pub fn window(mut self, window: RelativeWindow) -> Self {
        self.window = window;
        self
    }
}

pub struct AnalyticsFacade {
    series: SeriesQuery,
    rank: RankQuery,
}

impl AnalyticsFacade {
    pub fn new(store: Arc<dyn TimeSeriesStore>, mode: StdDevMode) -> Self {
        Self {
            series: SeriesQuery::new(Arc::clone(&store)),
            rank: RankQuery::new(store, mode),
        }
    }

    #[instrument(skip(self), fields(pair = %request.pair, window = %request.window))]
    pub async fn get_analytics(
        &self,
        request: &AnalyticsRequest,
    ) -> Result<AnalyticsResponse, AnalyticsError> {
        let exchange = request.exchange.as_deref();

        let (prices, rank) = tokio::try_join!(
            async {
                self.series
                    .fetch(&request.pair, exchange, &request.window)
                    .await
                    .map_err(AnalyticsError::series)
            },
            async {
                self.rank
                    .compute(&request.pair, exchange, &request.window)
                    .await
                    .map_err(AnalyticsError::rank)
            },
        )?;

        debug!(samples = prices.len(), %rank, "Analytics computed");

        Ok(AnalyticsResponse {
            pair: request.pair.clone(),
            rank,
            duration: request.window.literal().to_string(),
            prices,
        })
    }
}
