//! One ranking snapshot
//!
//! Runs the three rankings through the retry wrapper and gathers the
//! results. The first ranking that still fails after its retries aborts the
//! whole report; there is no partial result.

use crate::ranking::RankingEngine;
use crate::retry::{retry, RetryPolicy};
use chrono::{DateTime, Utc};
use serde::Serialize;
use spot_ranker_core::{
    InstanceKey, MetricsQuery, PriceCatalog, PriceExtremes, RankingResult, Result, ZonedInstance,
};
use std::fmt::Display;
use tracing::info;

/// Results of one ranking run
#[derive(Debug, Clone, Serialize)]
pub struct RankingReport {
    pub region: String,
    pub zone: String,
    pub generated_at: DateTime<Utc>,

    /// Highest max/min price ratio over the volatility window
    pub most_volatile: RankingResult<InstanceKey>,

    /// Cheapest and most expensive instance types in `zone`
    pub price_extremes: PriceExtremes,

    /// Largest discount against on-demand
    pub highest_saving: RankingResult<ZonedInstance>,
}

impl RankingReport {
    /// Render the report as log lines
    pub fn log(&self) {
        info!("Query region zone: {} {}", self.region, self.zone);
        info!("1. Most volatile instance types: {}", join(self.most_volatile.keys()));
        info!(
            "2. Cheapest and most expensive in zone {}: cheapest [{}], most expensive [{}]",
            self.zone,
            self.price_extremes.cheapest.join(", "),
            self.price_extremes.most_expensive.join(", ")
        );
        info!("3. Highest saving instance types: {}", join(self.highest_saving.keys()));
    }
}

fn join<T: Display>(items: Vec<&T>) -> String {
    let parts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

/// Run all three rankings for `region`/`zone`.
///
/// Sequential unless `parallel` is set, in which case the rankings share the
/// engine (and its read-only catalog) and run concurrently on this task.
pub async fn run_report<M, P>(
    engine: &RankingEngine<M, P>,
    region: &str,
    zone: &str,
    policy: &RetryPolicy,
    parallel: bool,
) -> Result<RankingReport>
where
    M: MetricsQuery,
    P: PriceCatalog,
{
    let volatile = move || engine.most_volatile(region);
    let extremes = move || engine.cheapest_and_most_expensive(region, zone);
    let saving = move || engine.highest_saving(region);

    let (most_volatile, price_extremes, highest_saving) = if parallel {
        tokio::try_join!(
            retry(policy, "most_volatile", volatile),
            retry(policy, "price_extremes", extremes),
            retry(policy, "highest_saving", saving),
        )?
    } else {
        let most_volatile = retry(policy, "most_volatile", volatile).await?;
        let price_extremes = retry(policy, "price_extremes", extremes).await?;
        let highest_saving = retry(policy, "highest_saving", saving).await?;
        (most_volatile, price_extremes, highest_saving)
    };

    Ok(RankingReport {
        region: region.to_string(),
        zone: zone.to_string(),
        generated_at: Utc::now(),
        most_volatile,
        price_extremes,
        highest_saving,
    })
}
