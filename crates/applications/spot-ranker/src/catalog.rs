//! On-demand price catalog
//!
//! Loaded once per region before any ranking runs and never mutated
//! afterwards. Both sources use the price server's regional format:
//!
//! ```json
//! {
//!   "instanceTypePrices": {
//!     "m5.large": { "onDemandPricePerHour": 0.096, "zones": ["use2-az1"], "vcpu": 2 }
//!   }
//! }
//! ```
//!
//! Only `onDemandPricePerHour` is read; other fields are ignored.

use crate::config::CatalogSource;
use serde::Deserialize;
use spot_ranker_core::{PriceCatalog, PriceCatalogEntry, RankerError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Placeholder replaced by the region in price server URLs
const REGION_PLACEHOLDER: &str = "{region}";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegionalInstancePrice {
    #[serde(default)]
    instance_type_prices: HashMap<String, Option<InstanceTypePrice>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceTypePrice {
    on_demand_price_per_hour: f64,
}

/// Immutable instance type → on-demand price table for one region
#[derive(Debug, Clone)]
pub struct StaticPriceCatalog {
    region: String,
    prices: HashMap<String, f64>,
}

impl StaticPriceCatalog {
    /// Build from explicit entries; a later duplicate replaces an earlier one
    pub fn new(region: impl Into<String>, entries: impl IntoIterator<Item = PriceCatalogEntry>) -> Self {
        Self {
            region: region.into(),
            prices: entries
                .into_iter()
                .map(|e| (e.instance_type, e.on_demand_price_per_hour))
                .collect(),
        }
    }

    /// Parse a price server document
    pub fn from_json(region: impl Into<String>, raw: &str) -> Result<Self> {
        let doc: RegionalInstancePrice = serde_json::from_str(raw)
            .map_err(|e| RankerError::config(format!("Invalid price catalog: {}", e)))?;

        let entries = doc
            .instance_type_prices
            .into_iter()
            .filter_map(|(instance_type, price)| {
                price.map(|p| PriceCatalogEntry::new(instance_type, p.on_demand_price_per_hour))
            });

        Ok(Self::new(region, entries))
    }

    /// Load from a local JSON file
    pub fn from_file(region: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RankerError::config(format!("Failed to read price catalog {}: {}", path.display(), e))
        })?;
        Self::from_json(region, &raw)
    }

    /// Load from whichever source the configuration names
    pub async fn load(source: &CatalogSource, region: &str, timeout: Duration) -> Result<Self> {
        let catalog = match source {
            CatalogSource::PriceServer { url } => {
                PriceServerClient::new(url.clone(), timeout)?.fetch(region).await?
            }
            CatalogSource::File { path } => Self::from_file(region, path)?,
        };

        info!(region = %region, instance_types = catalog.len(), "Loaded on-demand price catalog");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl PriceCatalog for StaticPriceCatalog {
    fn region(&self) -> &str {
        &self.region
    }

    fn price_of(&self, instance_type: &str) -> Result<f64> {
        self.prices
            .get(instance_type)
            .copied()
            .ok_or_else(|| RankerError::NotFound(instance_type.to_string()))
    }
}

/// HTTP client for the regional price server
pub struct PriceServerClient {
    /// URL template, may contain `{region}`
    url_template: String,

    client: reqwest::Client,
}

impl PriceServerClient {
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RankerError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url_template: url_template.into(),
            client,
        })
    }

    /// Concrete URL for a region
    pub fn url_for(&self, region: &str) -> String {
        self.url_template.replace(REGION_PLACEHOLDER, region)
    }

    /// Fetch the catalog for `region`
    pub async fn fetch(&self, region: &str) -> Result<StaticPriceCatalog> {
        let url = self.url_for(region);
        debug!(url = %url, "Fetching on-demand price catalog");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RankerError::transport(format!("price server request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RankerError::transport(format!(
                "price server returned status {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RankerError::transport(format!("reading price catalog failed: {}", e)))?;

        StaticPriceCatalog::from_json(region, &body)
    }
}
