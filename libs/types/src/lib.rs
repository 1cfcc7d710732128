//! Types library for the crypto price analytics service
//!
//! Shared type definitions for the ingestion pipeline and the analytics
//! queries. Raw feed strings are turned into these validated types at the
//! edges and never travel further into the system.
//!
//! # Modules
//! - `market`: Market keys (`venue:exchange:pair`) and price snapshots
//! - `observation`: Persisted observations and query result shapes
//! - `window`: Trailing time windows (`-24h`, `90m`, ...)
//! - `errors`: Error taxonomy for key and window parsing

// Public modules
pub mod market;
pub mod observation;
pub mod window;
pub mod errors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::market::*;
    pub use crate::observation::*;
    pub use crate::window::*;
    pub use crate::errors::*;
}
