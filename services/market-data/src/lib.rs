//! Market Data Service
//!
//! Harvests crypto prices from an upstream feed into a time-series store and
//! answers analytics queries over what was stored:
//! - Periodic snapshot ingestion with malformed-key filtering
//! - Raw price series per pair, optionally per exchange
//! - Volatility rank of a pair among all pairs in a window
//!
//! # Architecture
//!
//! ```text
//!   PriceFeed (HTTP)
//!        │
//!    ┌───▼────┐     ┌─────────┐
//!    │ Ingest │ ◄── │Scheduler│
//!    └───┬────┘     └─────────┘
//!        │ keys → encoder
//!  ┌─────▼──────────────┐
//!  │  TimeSeriesStore   │   InfluxStore | MemoryStore
//!  └─────┬──────────────┘
//!    ┌───┴─────┐
//! ┌──▼───┐ ┌───▼──┐
//! │Series│ │ Rank │
//! └──┬───┘ └───┬──┘
//!  ┌─▼─────────▼─┐
//!  │  Analytics  │
//!  └─────────────┘
//! ```

pub mod analytics;
pub mod encoder;
pub mod feed;
pub mod ingestion;
pub mod keys;
pub mod rank;
pub mod scheduler;
pub mod series;
pub mod store;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
