use market_data::analytics::AnalyticsFacade;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub analytics: Arc<AnalyticsFacade>,
    pub request_timeout: Duration, // Upper bound on one analytics request
}

impl AppState {
    pub fn new(analytics: Arc<AnalyticsFacade>, request_timeout: Duration) -> Self {
        Self {
            analytics,
            request_timeout,
        }
    }
}
