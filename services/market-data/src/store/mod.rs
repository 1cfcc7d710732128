//! Time-series storage capability
//!
//! The ingestion job and the analytics queries talk to storage only through
//! [`TimeSeriesStore`]. Reads are expressed as a backend-neutral [`Query`]
//! pipeline (window → filters → optional per-group stddev → flatten → sort);
//! each adapter translates it into whatever its backend understands.
//!
//! Result shape mirrors what a time-series backend returns: a list of
//! [`Table`]s, one per series (or a single flattened table after an
//! aggregate), each holding time-ordered [`Record`]s.

pub mod influx;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use types::observation::{Observation, Tags};
use types::window::RelativeWindow;

pub use influx::{InfluxConfig, InfluxStore};
pub use memory::MemoryStore;

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("undecodable storage response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Durable append and windowed aggregation over tagged observations.
///
/// Implementations must be safe to share across concurrent callers.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Append a batch of observations.
    async fn write(&self, batch: &[Observation]) -> Result<(), StoreError>;

    /// Evaluate a query pipeline.
    async fn query(&self, query: &Query) -> Result<Vec<Table>, StoreError>;
}

/// Standard deviation divisor convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdDevMode {
    /// Divide by `n - 1`; groups with fewer than two samples yield `0.0`.
    #[default]
    Sample,
    /// Divide by `n`.
    Population,
}

impl StdDevMode {
    /// Flux `stddev(mode:)` argument.
    pub fn as_str(&self) -> &'static str {
        match self {
            StdDevMode::Sample => "sample",
            StdDevMode::Population => "population",
        }
    }

    /// Compute the standard deviation of `values` under this convention.
    pub fn stddev(&self, values: &[f64]) -> f64 {
        let n = values.len();
        let divisor = match self {
            StdDevMode::Sample if n < 2 => return 0.0,
            StdDevMode::Sample => (n - 1) as f64,
            StdDevMode::Population if n == 0 => return 0.0,
            StdDevMode::Population => n as f64,
        };

        let mean = values.iter().sum::<f64>() / n as f64;
        let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (sum_sq / divisor).sqrt()
    }
}

impl std::str::FromStr for StdDevMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sample" => Ok(StdDevMode::Sample),
            "population" => Ok(StdDevMode::Population),
            other => Err(format!("unknown stddev mode {:?}", other)),
        }
    }
}

/// Aggregation step of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    /// One standard deviation per distinct combination of `group_by` tags.
    StdDev { group_by: Vec<String>, mode: StdDevMode },
}

/// Sort step applied to record values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Descending,
}

/// Declarative read pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub window: RelativeWindow,
    pub measurement: Option<String>,
    pub field: Option<String>,
    pub tag_filters: Vec<(String, String)>,
    pub aggregate: Option<Aggregate>,
    pub sort: Option<SortOrder>,
}

impl Query {
    /// Start a pipeline over the trailing `window`.
    pub fn range(window: RelativeWindow) -> Self {
        Self {
            window,
            measurement: None,
            field: None,
            tag_filters: Vec::new(),
            aggregate: None,
            sort: None,
        }
    }

    pub fn measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = Some(measurement.into());
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Keep only records whose tag `key` equals `value`.
    pub fn tag_eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tag_filters.push((key.into(), value.into()));
        self
    }

    /// Standard deviation per group, flattened into one table.
    pub fn stddev_by<I, S>(mut self, group_by: I, mode: StdDevMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aggregate = Some(Aggregate::StdDev {
            group_by: group_by.into_iter().map(Into::into).collect(),
            mode,
        });
        self
    }

    /// Sort records by value, largest first.
    pub fn sort_desc(mut self) -> Self {
        self.sort = Some(SortOrder::Descending);
        self
    }

    /// Whether a record with these coordinates passes every filter.
    pub fn matches(&self, measurement: &str, field: &str, tags: &Tags) -> bool {
        self.measurement.as_deref().map_or(true, |m| m == measurement)
            && self.field.as_deref().map_or(true, |f| f == field)
            && self
                .tag_filters
                .iter()
                .all(|(k, v)| tags.get(k).is_some_and(|t| t == v))
    }
}

/// One row of a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub value: f64,
    /// Absent on aggregate rows.
    pub time: Option<DateTime<Utc>>,
    pub tags: Tags,
}

impl Record {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// A group of records sharing a series (or the flattened aggregate result).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub records: Vec<Record>,
}

impl Table {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::observation::tag;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_sample_stddev() {
        // Sample variance of 2,4,4,4,5,5,7,9 is 32/7
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let sd = StdDevMode::Sample.stddev(&values);
        assert!((sd - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_population_stddev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((StdDevMode::Population.stddev(&values) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_stddev_of_small_groups_is_zero() {
        assert_eq!(StdDevMode::Sample.stddev(&[42.0]), 0.0);
        assert_eq!(StdDevMode::Sample.stddev(&[]), 0.0);
        assert_eq!(StdDevMode::Population.stddev(&[42.0]), 0.0);
        assert_eq!(StdDevMode::Population.stddev(&[]), 0.0);
    }

    #[test]
    fn test_stddev_mode_from_str() {
        assert_eq!("sample".parse::<StdDevMode>(), Ok(StdDevMode::Sample));
        assert_eq!("Population".parse::<StdDevMode>(), Ok(StdDevMode::Population));
        assert!("median".parse::<StdDevMode>().is_err());
    }

    #[test]
    fn test_query_matches_filters() {
        let query = Query::range(RelativeWindow::default())
            .measurement("crypto_prices")
            .field("price")
            .tag_eq(tag::PAIR, "btcusd");

        let btc = tags(&[(tag::PAIR, "btcusd"), (tag::EXCHANGE, "kraken")]);
        let eth = tags(&[(tag::PAIR, "ethusd"), (tag::EXCHANGE, "kraken")]);

        assert!(query.matches("crypto_prices", "price", &btc));
        assert!(!query.matches("crypto_prices", "price", &eth));
        assert!(!query.matches("crypto_prices", "volume", &btc));
        assert!(!query.matches("other", "price", &btc));
        assert!(!query.matches("crypto_prices", "price", &Tags::new()));
    }

    #[test]
    fn test_builder_collects_steps() {
        let query = Query::range(RelativeWindow::default())
            .stddev_by([tag::PAIR], StdDevMode::Population)
            .sort_desc();

        assert_eq!(
            query.aggregate,
            Some(Aggregate::StdDev {
                group_by: vec!["pair".to_string()],
                mode: StdDevMode::Population,
            })
        );
        assert_eq!(query.sort, Some(SortOrder::Descending));
    }
}
