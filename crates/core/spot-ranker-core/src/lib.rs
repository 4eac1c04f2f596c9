//! Spot Ranker Core - Shared types and ports
//!
//! This crate defines the abstractions used by the ranking engine and the
//! adapters that feed it:
//! - `MetricsQuery` trait (time-series store holding spot price samples)
//! - `PriceCatalog` trait (on-demand price table for one region)
//! - Sample, key and ranking result types
//! - Error types

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
