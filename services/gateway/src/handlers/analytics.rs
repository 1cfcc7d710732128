use crate::error::AppError;
use crate::state::AppState;
use crate::validation::{is_pair, is_slug};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use market_data::analytics::AnalyticsRequest;
use serde::Deserialize;
use types::observation::AnalyticsResponse;
use types::window::{DEFAULT_WINDOW, RelativeWindow};

pub const USAGE_HINT: &str = "Example request: GET /btcusd?duration=-24h&exchange=kraken";

#[derive(Debug, Deserialize)]
pub struct MetricParams {
    pub duration: Option<String>,
    pub exchange: Option<String>,
}

pub async fn index() -> &'static str {
    USAGE_HINT
}

pub async fn crypto_metric(
    State(state): State<AppState>,
    Path(pair): Path<String>,
    Query(params): Query<MetricParams>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    // Route only matches lowercase pairs
    if !is_pair(&pair) {
        return Err(AppError::NotFound(format!("No route for /{}", pair)));
    }

    let duration = params.duration.as_deref().unwrap_or(DEFAULT_WINDOW);
    if !is_slug(duration) {
        return Err(AppError::BadRequest(format!("Invalid duration {:?}", duration)));
    }
    if let Some(exchange) = params.exchange.as_deref() {
        if !is_slug(exchange) {
            return Err(AppError::BadRequest(format!("Invalid exchange {:?}", exchange)));
        }
    }
    let window: RelativeWindow = duration
        .parse()
        .map_err(|e| AppError::BadRequest(format!("{}", e)))?;

    let mut request = AnalyticsRequest::new(pair).window(window);
    if let Some(exchange) = params.exchange {
        request = request.exchange(exchange);
    }

    tracing::debug!(pair = %request.pair, exchange = ?request.exchange, duration, "Analytics request");

    let response = tokio::time::timeout(state.request_timeout, state.analytics.get_analytics(&request))
        .await
        .map_err(|_| {
            AppError::GatewayTimeout(format!(
                "Analytics query exceeded {} ms",
                state.request_timeout.as_millis()
            ))
        })??;

    Ok(Json(response))
}
