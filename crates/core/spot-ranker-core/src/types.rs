//! Core types shared across spot ranking components

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of entries kept by each ranking
pub const DEFAULT_TOP_N: usize = 3;

/// One labeled spot price sample from an instant query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Instance type label (e.g. "m5.large")
    pub instance_type: String,

    /// Availability zone label, absent for aggregated queries
    pub zone: Option<String>,

    /// Region label, absent when the query aggregates it away
    pub region: Option<String>,

    /// Spot price (USD per hour)
    pub value: f64,
}

impl Sample {
    /// Create a sample without zone or region labels
    pub fn new(instance_type: impl Into<String>, value: f64) -> Self {
        Self {
            instance_type: instance_type.into(),
            zone: None,
            region: None,
            value,
        }
    }

    /// Set the zone label
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Set the region label
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// A single timestamped value inside a [`Series`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

/// Labeled time series returned by a range query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub instance_type: String,
    pub zone: Option<String>,
    pub region: Option<String>,
    pub points: Vec<PricePoint>,
}

/// On-demand price for one instance type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceCatalogEntry {
    pub instance_type: String,
    pub on_demand_price_per_hour: f64,
}

impl PriceCatalogEntry {
    pub fn new(instance_type: impl Into<String>, on_demand_price_per_hour: f64) -> Self {
        Self {
            instance_type: instance_type.into(),
            on_demand_price_per_hour,
        }
    }
}

/// Typed join key for per-region aggregates
///
/// Ordering is region first, then instance type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceKey {
    pub region: String,
    pub instance_type: String,
}

impl InstanceKey {
    pub fn new(region: impl Into<String>, instance_type: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            instance_type: instance_type.into(),
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.region, self.instance_type)
    }
}

/// Instance type placed in a specific zone
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZonedInstance {
    pub instance_type: String,
    pub zone: Option<String>,
}

impl ZonedInstance {
    pub fn new(instance_type: impl Into<String>, zone: Option<String>) -> Self {
        Self {
            instance_type: instance_type.into(),
            zone,
        }
    }
}

impl fmt::Display for ZonedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.zone {
            Some(zone) => write!(f, "{}@{}", self.instance_type, zone),
            None => write!(f, "{}", self.instance_type),
        }
    }
}

/// Sortable unit produced by a ranking before truncation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry<K> {
    pub key: K,
    pub metric: f64,
}

impl<K> RankedEntry<K> {
    pub fn new(key: K, metric: f64) -> Self {
        Self { key, metric }
    }
}

/// Ordered top-N output of a ranking operation
///
/// Never longer than the N it was built with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankingResult<K> {
    entries: Vec<RankedEntry<K>>,
}

impl<K> RankingResult<K> {
    /// Keep the first `top_n` entries of an already ordered list
    pub fn from_ordered(mut entries: Vec<RankedEntry<K>>, top_n: usize) -> Self {
        entries.truncate(top_n);
        Self { entries }
    }

    pub fn entries(&self) -> &[RankedEntry<K>] {
        &self.entries
    }

    /// Ranked identifiers, best first
    pub fn keys(&self) -> Vec<&K> {
        self.entries.iter().map(|e| &e.key).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cheapest and most expensive instance types of one zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceExtremes {
    /// Ascending by spot price
    pub cheapest: Vec<String>,

    /// Descending by spot price
    pub most_expensive: Vec<String>,
}
