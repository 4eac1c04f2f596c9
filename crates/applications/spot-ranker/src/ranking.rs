//! Spot price ranking engine
//!
//! Three independent rankings, each producing a top-N list:
//!
//! - **Price extremes**: cheapest and most expensive instance types in a zone
//! - **Volatility**: `max / min` of the cross-zone price sum over a trailing
//!   window, per instance type
//! - **Savings**: `(on_demand - spot) / on_demand` per (instance type, zone)
//!
//! ## Ordering
//!
//! All sorts are stable. Price extremes and savings keep sample order among
//! equal values. Volatility ties fall back to the key order (region, then
//! instance type), since its input comes from maps with no meaningful order.
//!
//! The ranking functions are pure; [`RankingEngine`] wires them to the
//! metrics and price catalog ports.

use crate::config::RankerConfig;
use crate::queries::{QueryBuilder, WindowAggregate};
use chrono::Utc;
use spot_ranker_core::{
    InstanceKey, MetricsQuery, PriceCatalog, PriceExtremes, RankedEntry, RankerError,
    RankingResult, Result, Sample, ZonedInstance, DEFAULT_TOP_N,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cheapest `top_n` (ascending) and most expensive `top_n` (descending).
///
/// Both lists are cut from one stable ascending sort: the head is the
/// cheapest, the tail reversed by price is the most expensive. Equal prices
/// inside the tail stay in sample order. With fewer than `2 * top_n` samples
/// the two lists may overlap.
pub fn rank_price_extremes(samples: &[Sample], top_n: usize) -> PriceExtremes {
    let mut ascending: Vec<&Sample> = samples.iter().collect();
    ascending.sort_by(|a, b| a.value.total_cmp(&b.value));

    let mut tail: Vec<&Sample> = ascending[ascending.len().saturating_sub(top_n)..].to_vec();
    tail.sort_by(|a, b| b.value.total_cmp(&a.value));

    PriceExtremes {
        cheapest: ascending
            .iter()
            .take(top_n)
            .map(|s| s.instance_type.clone())
            .collect(),
        most_expensive: tail.iter().map(|s| s.instance_type.clone()).collect(),
    }
}

/// Key every sample by `(region, instance_type)`.
///
/// The queried region is used rather than the sample's label, so a backend
/// that drops the label still joins. A repeated instance type keeps the last value.
pub fn aggregate_by_instance(region: &str, samples: &[Sample]) -> BTreeMap<InstanceKey, f64> {
    samples
        .iter()
        .map(|s| (InstanceKey::new(region, s.instance_type.as_str()), s.value))
        .collect()
}

/// Join max and min aggregates and rank by `max / min`, highest first.
///
/// Keys missing from `min`, or whose min is `<= 0`, are skipped.
pub fn rank_volatility(
    max: &BTreeMap<InstanceKey, f64>,
    min: &BTreeMap<InstanceKey, f64>,
    top_n: usize,
) -> RankingResult<InstanceKey> {
    let mut ratios: Vec<RankedEntry<InstanceKey>> = max
        .iter()
        .filter_map(|(key, &max_value)| match min.get(key) {
            Some(&min_value) if min_value > 0.0 => {
                Some(RankedEntry::new(key.clone(), max_value / min_value))
            }
            Some(&min_value) => {
                debug!(key = %key, min = min_value, "Skipping non-positive minimum");
                None
            }
            None => {
                debug!(key = %key, "Skipping key without minimum");
                None
            }
        })
        .collect();

    // BTreeMap iteration is key-ordered, so the stable sort breaks ties by key
    ratios.sort_by(|a, b| b.metric.total_cmp(&a.metric));

    RankingResult::from_ordered(ratios, top_n)
}

/// Rank samples by discount against the on-demand price, highest first.
///
/// Samples whose instance type is missing from the catalog, or whose
/// on-demand price is `<= 0`, are skipped. Fails with `NoEligibleEntry`
/// when nothing is left.
pub fn rank_savings<P>(
    samples: &[Sample],
    catalog: &P,
    top_n: usize,
) -> Result<RankingResult<ZonedInstance>>
where
    P: PriceCatalog + ?Sized,
{
    let mut savings = Vec::with_capacity(samples.len());

    for sample in samples {
        let on_demand = match catalog.price_of(&sample.instance_type) {
            Ok(price) => price,
            Err(e) => {
                warn!(instance_type = %sample.instance_type, error = %e, "Failed to get on-demand price");
                continue;
            }
        };

        if on_demand <= 0.0 {
            debug!(instance_type = %sample.instance_type, on_demand, "Skipping non-positive on-demand price");
            continue;
        }

        let ratio = (on_demand - sample.value) / on_demand;
        savings.push(RankedEntry::new(
            ZonedInstance::new(sample.instance_type.as_str(), sample.zone.clone()),
            ratio,
        ));
    }

    if savings.is_empty() {
        return Err(RankerError::NoEligibleEntry(format!(
            "none of {} samples had a usable on-demand price",
            samples.len()
        )));
    }

    savings.sort_by(|a, b| b.metric.total_cmp(&a.metric));

    Ok(RankingResult::from_ordered(savings, top_n))
}

/// Ranking engine over a metrics store and an on-demand price catalog
pub struct RankingEngine<M, P> {
    metrics: M,
    catalog: P,
    queries: QueryBuilder,
    top_n: usize,
    window: Duration,
    resolution: Duration,
}

impl<M, P> RankingEngine<M, P>
where
    M: MetricsQuery,
    P: PriceCatalog,
{
    /// Create an engine with default metric name, top-N and volatility window
    pub fn new(metrics: M, catalog: P) -> Self {
        Self {
            metrics,
            catalog,
            queries: QueryBuilder::default(),
            top_n: DEFAULT_TOP_N,
            window: Duration::from_secs(crate::config::DEFAULT_VOLATILITY_WINDOW_SECS),
            resolution: Duration::from_secs(crate::config::DEFAULT_VOLATILITY_RESOLUTION_SECS),
        }
    }

    /// Create an engine using the configured metric, top-N and window
    pub fn from_config(metrics: M, catalog: P, config: &RankerConfig) -> Self {
        Self::new(metrics, catalog)
            .with_metric_name(config.metric_name.as_str())
            .with_top_n(config.top_n)
            .with_window(config.volatility_window(), config.volatility_resolution())
    }

    /// Set entries kept per ranking
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Set the spot price metric name
    pub fn with_metric_name(mut self, metric: impl Into<String>) -> Self {
        self.queries = QueryBuilder::new(metric);
        self
    }

    /// Set the volatility window and its sampling resolution
    pub fn with_window(mut self, window: Duration, resolution: Duration) -> Self {
        self.window = window;
        self.resolution = resolution;
        self
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    /// Evaluate an instant query now, failing with `NoData` on an empty result
    async fn current_samples(&self, expression: &str, scope: &str) -> Result<Vec<Sample>> {
        let samples = self.metrics.instant(expression, Utc::now()).await?;
        if samples.is_empty() {
            return Err(RankerError::no_data(scope.to_string()));
        }
        Ok(samples)
    }

    /// Cheapest and most expensive instance types in `zone`
    pub async fn cheapest_and_most_expensive(&self, region: &str, zone: &str) -> Result<PriceExtremes> {
        let query = self.queries.zone_prices(region, zone);
        let samples = self
            .current_samples(&query, &format!("spot prices for {} {}", region, zone))
            .await?;

        let extremes = rank_price_extremes(&samples, self.top_n);
        debug!(
            region = %region,
            zone = %zone,
            samples = samples.len(),
            cheapest = ?extremes.cheapest,
            most_expensive = ?extremes.most_expensive,
            "Ranked price extremes"
        );
        Ok(extremes)
    }

    /// Instance types whose cross-zone price moved the most over the window
    pub async fn most_volatile(&self, region: &str) -> Result<RankingResult<InstanceKey>> {
        let at = Utc::now();
        let max_query = self
            .queries
            .windowed_aggregate(WindowAggregate::Max, region, self.window, self.resolution);
        let min_query = self
            .queries
            .windowed_aggregate(WindowAggregate::Min, region, self.window, self.resolution);

        let max_samples = self.metrics.instant(&max_query, at).await?;
        let min_samples = self.metrics.instant(&min_query, at).await?;

        let max = aggregate_by_instance(region, &max_samples);
        let min = aggregate_by_instance(region, &min_samples);

        let ranked = rank_volatility(&max, &min, self.top_n);
        if ranked.is_empty() {
            info!(region = %region, "No instance type eligible for volatility ranking");
        }
        Ok(ranked)
    }

    /// (instance type, zone) pairs with the largest discount against on-demand
    pub async fn highest_saving(&self, region: &str) -> Result<RankingResult<ZonedInstance>> {
        if self.catalog.region() != region {
            warn!(
                catalog_region = %self.catalog.region(),
                region = %region,
                "Price catalog was loaded for a different region"
            );
        }

        let query = self.queries.region_prices(region);
        let samples = self
            .current_samples(&query, &format!("spot prices for {}", region))
            .await?;

        rank_savings(&samples, &self.catalog, self.top_n)
    }
}
