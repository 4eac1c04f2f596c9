//! Ports for the ranking engine
//!
//! The engine works through these interfaces ONLY - never concrete clients.
//! Query expressions are opaque strings here; building them is the caller's job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::types::{Sample, Series};

/// Time-series store holding spot price samples.
///
/// Implementations must keep failure kinds apart: `Transport` when the
/// expression could not be evaluated, `Shape` when the result is not a
/// sample vector (or matrix for ranges). An empty result is `Ok(vec![])`.
#[async_trait]
pub trait MetricsQuery: Send + Sync {
    /// Evaluate `expression` at a single instant
    async fn instant(&self, expression: &str, at: DateTime<Utc>) -> Result<Vec<Sample>>;

    /// Evaluate `expression` over `[start, end]` at `step` resolution
    ///
    /// The ranking engine evaluates its volatility window as an instant
    /// subquery and does not call this; it serves callers that need the raw
    /// series.
    async fn range(
        &self,
        expression: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<Series>>;
}

/// Immutable on-demand price table for one region
pub trait PriceCatalog: Send + Sync {
    /// Region the table was loaded for
    fn region(&self) -> &str;

    /// On-demand hourly price, or `RankerError::NotFound`
    fn price_of(&self, instance_type: &str) -> Result<f64>;
}

#[async_trait]
impl<T: MetricsQuery + ?Sized> MetricsQuery for Arc<T> {
    async fn instant(&self, expression: &str, at: DateTime<Utc>) -> Result<Vec<Sample>> {
        (**self).instant(expression, at).await
    }

    async fn range(
        &self,
        expression: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<Series>> {
        (**self).range(expression, start, end, step).await
    }
}

impl<T: PriceCatalog + ?Sized> PriceCatalog for Arc<T> {
    fn region(&self) -> &str {
        (**self).region()
    }

    fn price_of(&self, instance_type: &str) -> Result<f64> {
        (**self).price_of(instance_type)
    }
}
