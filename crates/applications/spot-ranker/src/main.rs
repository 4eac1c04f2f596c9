//! Spot Ranker - one ranking snapshot per invocation
//!
//! ## Usage
//!
//! ```bash
//! # Rank us-east-2 / use2-az1 against a local Prometheus
//! spot-ranker --region us-east-2 --zone use2-az1 \
//!     --price-server-url 'https://prices.internal/{region}' 
//!
//! # Use a config file, override the retry budget, print JSON too
//! spot-ranker --config ranker.json --retry-attempts 5 --retry-delay-secs 2 --json
//!
//! # Offline price table
//! spot-ranker --price-file ./prices/us-east-2.json
//! ```

use anyhow::Context;
use clap::Parser;
use spot_ranker::{
    run_report, CatalogSource, PrometheusClient, RankerConfig, RankingEngine, RetryMode,
    StaticPriceCatalog,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Rank spot instances by price, volatility and savings against on-demand
#[derive(Parser)]
#[command(name = "spot-ranker")]
#[command(about = "Rank spot instances by price, volatility and on-demand savings", long_about = None)]
struct Cli {
    /// JSON config file (flags override its values)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Region to rank (default: us-east-2)
    #[arg(long, env = "SPOT_RANKER_REGION")]
    region: Option<String>,

    /// Zone for cheapest/most expensive ranking (default: use2-az1)
    #[arg(long, env = "SPOT_RANKER_ZONE")]
    zone: Option<String>,

    /// Prometheus base URL (default: http://127.0.0.1:9090)
    #[arg(long, env = "SPOT_RANKER_PROMETHEUS_URL")]
    prometheus_url: Option<String>,

    /// Price server URL, `{region}` is substituted (this or --price-file is required)
    #[arg(long, env = "SPOT_RANKER_PRICE_SERVER_URL", conflicts_with = "price_file")]
    price_server_url: Option<String>,

    /// Load on-demand prices from a local JSON file instead
    #[arg(long)]
    price_file: Option<PathBuf>,

    /// Spot price metric name (default: aws_spot_instance_price)
    #[arg(long)]
    metric: Option<String>,

    /// Entries per ranking (default: 3)
    #[arg(long)]
    top_n: Option<usize>,

    /// Attempts per ranking (default: 20)
    #[arg(long)]
    retry_attempts: Option<u32>,

    /// Seconds between attempts (default: 10)
    #[arg(long)]
    retry_delay_secs: Option<u64>,

    /// Retry policy: transient or all (default: transient)
    #[arg(long)]
    retry_mode: Option<RetryMode>,

    /// Prometheus request timeout in seconds (default: 10)
    #[arg(long)]
    query_timeout_secs: Option<u64>,

    /// Volatility window in seconds (default: 604800, one week)
    #[arg(long)]
    window_secs: Option<u64>,

    /// Volatility resolution in seconds (default: 60)
    #[arg(long)]
    resolution_secs: Option<u64>,

    /// Run the three rankings concurrently
    #[arg(long)]
    parallel: bool,

    /// Also print the report as JSON on stdout
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Layer flags over the config file (or defaults)
    fn resolve_config(&self) -> anyhow::Result<RankerConfig> {
        let mut config = match &self.config {
            Some(path) => RankerConfig::from_file(path)?,
            None => RankerConfig::default(),
        };

        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(zone) = &self.zone {
            config.zone = zone.clone();
        }
        if let Some(url) = &self.prometheus_url {
            config.prometheus_url = url.clone();
        }
        if let Some(url) = &self.price_server_url {
            config.price_catalog = Some(CatalogSource::PriceServer { url: url.clone() });
        }
        if let Some(path) = &self.price_file {
            config.price_catalog = Some(CatalogSource::File { path: path.clone() });
        }
        if let Some(metric) = &self.metric {
            config.metric_name = metric.clone();
        }
        if let Some(top_n) = self.top_n {
            config.top_n = top_n;
        }
        if let Some(attempts) = self.retry_attempts {
            config.retry_attempts = attempts;
        }
        if let Some(delay) = self.retry_delay_secs {
            config.retry_delay_secs = delay;
        }
        if let Some(mode) = self.retry_mode {
            config.retry_mode = mode;
        }
        if let Some(timeout) = self.query_timeout_secs {
            config.query_timeout_secs = timeout;
        }
        if let Some(window) = self.window_secs {
            config.volatility_window_secs = window;
        }
        if let Some(resolution) = self.resolution_secs {
            config.volatility_resolution_secs = resolution;
        }
        if self.parallel {
            config.parallel = true;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spot_ranker=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    info!(
        region = %config.region,
        zone = %config.zone,
        prometheus = %config.prometheus_url,
        top_n = config.top_n,
        retry_attempts = config.retry_attempts,
        retry_mode = %config.retry_mode,
        parallel = config.parallel,
        "Starting spot ranking"
    );

    let metrics = PrometheusClient::new(config.prometheus_url.as_str(), config.query_timeout())?;
    let catalog = StaticPriceCatalog::load(config.price_source()?, &config.region, config.query_timeout())
        .await
        .with_context(|| format!("failed to load on-demand prices for {}", config.region))?;

    let engine = RankingEngine::from_config(metrics, Arc::new(catalog), &config);

    let report = match run_report(
        &engine,
        &config.region,
        &config.zone,
        &config.retry_policy(),
        config.parallel,
    )
    .await
    {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Ranking failed");
            return Err(e.into());
        }
    };

    report.log();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
