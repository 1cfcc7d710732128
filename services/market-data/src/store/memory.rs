//! In-process time-series store
//!
//! Holds every series in a concurrent map keyed by (measurement, field, tag
//! set) and evaluates [`Query`] pipelines directly. Observations without a
//! timestamp are stamped from the store clock at write time, one stamp per
//! batch. Points are never updated or removed.
//!
//! Result ordering:
//! - series tables come out in ascending series-key order, rows ascending by time
//! - aggregate groups are emitted in ascending group-key order before the sort
//!   step, and the sort is stable, so tied values keep group-key order

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;
use types::observation::{Observation, Tags, PRICE_FIELD};

use super::{Aggregate, Query, Record, SortOrder, StoreError, Table, TimeSeriesStore};

/// Source of "now" for write stamps and window evaluation.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct SeriesKey {
    measurement: String,
    field: String,
    tags: Tags,
}

#[derive(Debug, Clone, Copy)]
struct Point {
    time: DateTime<Utc>,
    value: f64,
}

/// Concurrent in-memory [`TimeSeriesStore`].
pub struct MemoryStore {
    series: DashMap<SeriesKey, Vec<Point>>,
    clock: Clock,
}

impl MemoryStore {
    /// Store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    /// Store driven by a caller-supplied clock.
    pub fn with_clock(clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        Self {
            series: DashMap::new(),
            clock: Arc::new(clock),
        }
    }

    /// Total number of stored points.
    pub fn len(&self) -> usize {
        self.series.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct series.
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn append(&self, key: SeriesKey, point: Point) {
        let mut points = self.series.entry(key).or_default();
        // Keep each series time-ordered; equal stamps keep arrival order
        let idx = points.partition_point(|p| p.time <= point.time);
        points.insert(idx, point);
    }

    fn select(&self, query: &Query, now: DateTime<Utc>) -> Vec<Table> {
        let mut matched: Vec<(SeriesKey, Vec<Record>)> = self
            .series
            .iter()
            .filter(|entry| {
                let key = entry.key();
                query.matches(&key.measurement, &key.field, &key.tags)
            })
            .map(|entry| {
                let key = entry.key().clone();
                let records = entry
                    .value()
                    .iter()
                    .filter(|p| query.window.contains(now, p.time))
                    .map(|p| Record {
                        value: p.value,
                        time: Some(p.time),
                        tags: key.tags.clone(),
                    })
                    .collect();
                (key, records)
            })
            .filter(|(_, records): &(SeriesKey, Vec<Record>)| !records.is_empty())
            .collect();

        matched.sort_by(|a, b| a.0.cmp(&b.0));
        matched
            .into_iter()
            .map(|(_, records)| Table::new(records))
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn aggregate(tables: Vec<Table>, aggregate: &Aggregate) -> Vec<Table> {
    match aggregate {
        Aggregate::StdDev { group_by, mode } => {
            let mut groups: BTreeMap<Tags, Vec<f64>> = BTreeMap::new();
            for record in tables.iter().flat_map(|t| t.records.iter()) {
                let key: Tags = group_by
                    .iter()
                    .filter_map(|k| record.tags.get(k).map(|v| (k.clone(), v.clone())))
                    .collect();
                groups.entry(key).or_default().push(record.value);
            }

            if groups.is_empty() {
                return Vec::new();
            }

            let records = groups
                .into_iter()
                .map(|(tags, values)| Record {
                    value: mode.stddev(&values),
                    time: None,
                    tags,
                })
                .collect();
            vec![Table::new(records)]
        }
    }
}

fn sort(tables: &mut [Table], order: SortOrder) {
    for table in tables {
        table.records.sort_by(|a, b| match order {
            SortOrder::Descending => b.value.total_cmp(&a.value),
        });
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn write(&self, batch: &[Observation]) -> Result<(), StoreError> {
        let stamp = self.now();
        for obs in batch {
            let key = SeriesKey {
                measurement: obs.measurement.clone(),
                field: PRICE_FIELD.to_string(),
                tags: obs.tags.clone(),
            };
            self.append(
                key,
                Point {
                    time: obs.timestamp.unwrap_or(stamp),
                    value: obs.price,
                },
            );
        }

        debug!(points = batch.len(), series = self.series.len(), "Batch appended");
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Table>, StoreError> {
        let now = self.now();
        let mut tables = self.select(query, now);

        if let Some(agg) = &query.aggregate {
            tables = aggregate(tables, agg);
        }
        if let Some(order) = query.sort {
            sort(&mut tables, order);
        }

        Ok(tables)
    }
}
