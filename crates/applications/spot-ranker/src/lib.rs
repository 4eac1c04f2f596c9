//! # Spot Ranker
//!
//! Ranks spot instance offerings to surface cost-optimization candidates.
//!
//! ## Architecture
//!
//! ```text
//! Prometheus (spot price gauges)      Price server (on-demand table)
//!          │                                     │
//!   PrometheusClient                    StaticPriceCatalog (loaded once)
//!          │                                     │
//!          └──────────── RankingEngine ──────────┘
//!                            │
//!                  retry (fixed attempts/delay)
//!                            │
//!                      RankingReport
//! ```
//!
//! The engine produces three top-N rankings per run:
//! - Cheapest and most expensive instance types in a zone
//! - Most price-volatile instance types over a trailing window
//! - Highest discount against on-demand per (instance type, zone)
//!
//! Each ranking is wrapped in [`retry::retry`] so a flaky metrics backend or
//! not-yet-ingested data does not abort the run on the first failure.

#![warn(clippy::all)]

pub mod catalog;
pub mod config;
pub mod prometheus;
pub mod queries;
pub mod ranking;
pub mod report;
pub mod retry;

// Core types
pub use spot_ranker_core::{
    InstanceKey, MetricsQuery, PriceCatalog, PriceCatalogEntry, PriceExtremes, RankedEntry,
    RankerError, RankingResult, Result, Sample, Series, ZonedInstance, DEFAULT_TOP_N,
};

// Configuration
pub use config::{CatalogSource, RankerConfig};

// Adapters
pub use catalog::{PriceServerClient, StaticPriceCatalog};
pub use prometheus::PrometheusClient;

// Ranking
pub use ranking::{rank_price_extremes, rank_savings, rank_volatility, RankingEngine};
pub use report::{run_report, RankingReport};
pub use retry::{retry, RetryMode, RetryPolicy};
