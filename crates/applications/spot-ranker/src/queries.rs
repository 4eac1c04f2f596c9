//! PromQL expressions for spot price ranking
//!
//! The exporter publishes one gauge per (instance type, zone):
//!
//! ```text
//! aws_spot_instance_price{region="us-east-2", zone="use2-az1", instance_type="m5.large"} 0.05
//! ```
//!
//! The ranking engine never parses these strings; it only hands them to the
//! metrics port.

use std::time::Duration;

/// Default spot price gauge name
pub const DEFAULT_SPOT_PRICE_METRIC: &str = "aws_spot_instance_price";

/// Label carrying the instance type
pub const INSTANCE_TYPE_LABEL: &str = "instance_type";

/// Label carrying the availability zone
pub const ZONE_LABEL: &str = "zone";

/// Label carrying the region
pub const REGION_LABEL: &str = "region";

/// Aggregation applied over the trailing window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAggregate {
    Max,
    Min,
}

impl WindowAggregate {
    fn function(&self) -> &'static str {
        match self {
            Self::Max => "max_over_time",
            Self::Min => "min_over_time",
        }
    }
}

/// Builds the expressions used by each ranking operation
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    metric: String,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SPOT_PRICE_METRIC)
    }
}

impl QueryBuilder {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
        }
    }

    /// Current prices of every instance type in one zone
    pub fn zone_prices(&self, region: &str, zone: &str) -> String {
        format!(
            r#"{}{{{}="{}", {}="{}"}}"#,
            self.metric,
            REGION_LABEL,
            escape_label_value(region),
            ZONE_LABEL,
            escape_label_value(zone)
        )
    }

    /// Current prices of every instance type in every zone of a region
    pub fn region_prices(&self, region: &str) -> String {
        format!(
            r#"{}{{{}="{}"}}"#,
            self.metric,
            REGION_LABEL,
            escape_label_value(region)
        )
    }

    /// Per instance type: `aggregate` over `window` of the cross-zone price sum,
    /// sampled every `resolution`
    pub fn windowed_aggregate(
        &self,
        aggregate: WindowAggregate,
        region: &str,
        window: Duration,
        resolution: Duration,
    ) -> String {
        format!(
            "{}((sum by({}, {}) ({}))[{}:{}])",
            aggregate.function(),
            INSTANCE_TYPE_LABEL,
            REGION_LABEL,
            self.region_prices(region),
            promql_duration(window),
            promql_duration(resolution)
        )
    }
}

/// Escape a label value for use inside double quotes
pub fn escape_label_value(value: &str) -> String {
    value.replace('\\', r"\\").replace('"', "\\\"")
}

/// Render a duration with the largest PromQL unit that divides it exactly
pub fn promql_duration(duration: Duration) -> String {
    const UNITS: [(u64, &str); 5] = [
        (7 * 24 * 3600, "w"),
        (24 * 3600, "d"),
        (3600, "h"),
        (60, "m"),
        (1, "s"),
    ];

    let secs = duration.as_secs();
    if secs == 0 {
        return format!("{}ms", duration.as_millis());
    }

    UNITS
        .iter()
        .find(|(unit, _)| secs % unit == 0)
        .map(|(unit, suffix)| format!("{}{}", secs / unit, suffix))
        .unwrap_or_else(|| format!("{}s", secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_prices_expression() {
        let queries = QueryBuilder::default();
        assert_eq!(
            queries.zone_prices("us-east-2", "use2-az1"),
            r#"aws_spot_instance_price{region="us-east-2", zone="use2-az1"}"#
        );
    }

    #[test]
    fn test_region_prices_expression() {
        let queries = QueryBuilder::new("gcp_spot_price");
        assert_eq!(
            queries.region_prices("europe-west4"),
            r#"gcp_spot_price{region="europe-west4"}"#
        );
    }

    #[test]
    fn test_windowed_aggregate_expression() {
        let queries = QueryBuilder::default();
        let week = Duration::from_secs(7 * 24 * 3600);
        let minute = Duration::from_secs(60);

        assert_eq!(
            queries.windowed_aggregate(WindowAggregate::Max, "us-east-2", week, minute),
            r#"max_over_time((sum by(instance_type, region) (aws_spot_instance_price{region="us-east-2"}))[1w:1m])"#
        );
        assert!(queries
            .windowed_aggregate(WindowAggregate::Min, "us-east-2", week, minute)
            .starts_with("min_over_time("));
    }

    #[test]
    fn test_promql_duration() {
        assert_eq!(promql_duration(Duration::from_secs(604_800)), "1w");
        assert_eq!(promql_duration(Duration::from_secs(172_800)), "2d");
        assert_eq!(promql_duration(Duration::from_secs(5400)), "90m");
        assert_eq!(promql_duration(Duration::from_secs(60)), "1m");
        assert_eq!(promql_duration(Duration::from_secs(45)), "45s");
        assert_eq!(promql_duration(Duration::from_millis(500)), "500ms");
    }

    #[test]
    fn test_label_values_are_escaped() {
        assert_eq!(escape_label_value(r#"us"east"#), r#"us\"east"#);
        assert_eq!(escape_label_value(r"a\b"), r"a\\b");
    }
}
