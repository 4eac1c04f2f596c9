//! Prometheus HTTP API adapter for the metrics port
//!
//! ## Endpoints
//!
//! ```text
//! GET /api/v1/query?query=<expr>&time=<unix>
//! GET /api/v1/query_range?query=<expr>&start=<unix>&end=<unix>&step=<secs>
//! ```
//!
//! Response envelope:
//! ```json
//! {
//!   "status": "success",
//!   "data": {
//!     "resultType": "vector",
//!     "result": [
//!       { "metric": { "instance_type": "m5.large", "zone": "use2-az1" }, "value": [1700000000.0, "0.05"] }
//!     ]
//!   },
//!   "warnings": []
//! }
//! ```
//!
//! Connection failures, timeouts, non-2xx statuses and `"status": "error"`
//! map to `Transport`. A result that is not a vector (instant) or matrix
//! (range), or a body that does not decode, maps to `Shape`.

use crate::queries::{INSTANCE_TYPE_LABEL, REGION_LABEL, ZONE_LABEL};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use spot_ranker_core::{MetricsQuery, PricePoint, RankerError, Result, Sample, Series};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const INSTANT_QUERY_PATH: &str = "/api/v1/query";
const RANGE_QUERY_PATH: &str = "/api/v1/query_range";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,

    #[serde(default)]
    data: Option<ApiData>,

    #[serde(rename = "errorType", default)]
    error_type: Option<String>,

    #[serde(default)]
    error: Option<String>,

    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiData {
    result_type: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorItem {
    metric: HashMap<String, String>,
    value: (f64, String),
}

#[derive(Debug, Deserialize)]
struct MatrixItem {
    metric: HashMap<String, String>,
    values: Vec<(f64, String)>,
}

/// Labels the ranking engine cares about
struct Labels {
    instance_type: String,
    zone: Option<String>,
    region: Option<String>,
}

impl Labels {
    fn from_metric(mut metric: HashMap<String, String>) -> Option<Self> {
        Some(Self {
            instance_type: metric.remove(INSTANCE_TYPE_LABEL)?,
            zone: metric.remove(ZONE_LABEL),
            region: metric.remove(REGION_LABEL),
        })
    }
}

/// Prometheus API client
pub struct PrometheusClient {
    /// Base URL, e.g. `http://127.0.0.1:9090`
    base_url: String,

    client: reqwest::Client,
}

impl PrometheusClient {
    /// Create a client with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RankerError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, query = ?params.first().map(|(_, v)| v), "Querying Prometheus");

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| RankerError::transport(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RankerError::transport(format!("reading response from {} failed: {}", url, e)))?;

        if !status.is_success() {
            // Prometheus still sends the JSON envelope on 4xx/5xx
            let detail = serde_json::from_str::<ApiResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(body);
            return Err(RankerError::transport(format!(
                "Prometheus returned status {}: {}",
                status, detail
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| RankerError::shape(format!("undecodable Prometheus response: {}", e)))
    }
}

#[async_trait]
impl MetricsQuery for PrometheusClient {
    async fn instant(&self, expression: &str, at: DateTime<Utc>) -> Result<Vec<Sample>> {
        let params = [
            ("query", expression.to_string()),
            ("time", unix_seconds(at)),
        ];
        let response = self.get(INSTANT_QUERY_PATH, &params).await?;
        parse_vector(response)
    }

    async fn range(
        &self,
        expression: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<Series>> {
        let params = [
            ("query", expression.to_string()),
            ("start", unix_seconds(start)),
            ("end", unix_seconds(end)),
            ("step", step.as_secs_f64().to_string()),
        ];
        let response = self.get(RANGE_QUERY_PATH, &params).await?;
        parse_matrix(response)
    }
}

fn unix_seconds(at: DateTime<Utc>) -> String {
    format!("{:.3}", at.timestamp_millis() as f64 / 1000.0)
}

/// Unwrap the envelope and check the result type
fn unwrap_data(response: ApiResponse, expected: &str) -> Result<serde_json::Value> {
    if response.status != "success" {
        return Err(RankerError::transport(format!(
            "query failed ({}): {}",
            response.error_type.as_deref().unwrap_or("unknown"),
            response.error.as_deref().unwrap_or("no error message")
        )));
    }

    for warning in &response.warnings {
        warn!(warning = %warning, "Prometheus query warning");
    }

    let data = response
        .data
        .ok_or_else(|| RankerError::shape("successful response without data"))?;

    if data.result_type != expected {
        return Err(RankerError::shape(format!(
            "expected {} result, got {}",
            expected, data.result_type
        )));
    }

    Ok(data.result)
}

/// Parse a sample value, keeping only finite non-negative prices
fn parse_price(raw: &str) -> Result<Option<f64>> {
    let value: f64 = raw
        .parse()
        .map_err(|_| RankerError::shape(format!("non-numeric sample value '{}'", raw)))?;

    if value.is_finite() && value >= 0.0 {
        Ok(Some(value))
    } else {
        Ok(None)
    }
}

fn parse_vector(response: ApiResponse) -> Result<Vec<Sample>> {
    let result = unwrap_data(response, "vector")?;
    let items: Vec<VectorItem> = serde_json::from_value(result)
        .map_err(|e| RankerError::shape(format!("malformed vector: {}", e)))?;

    let mut samples = Vec::with_capacity(items.len());
    for item in items {
        let Some(labels) = Labels::from_metric(item.metric) else {
            warn!("Dropping sample without {} label", INSTANCE_TYPE_LABEL);
            continue;
        };

        match parse_price(&item.value.1)? {
            Some(value) => samples.push(Sample {
                instance_type: labels.instance_type,
                zone: labels.zone,
                region: labels.region,
                value,
            }),
            None => warn!(
                instance_type = %labels.instance_type,
                value = %item.value.1,
                "Dropping sample with invalid price"
            ),
        }
    }

    Ok(samples)
}

fn parse_matrix(response: ApiResponse) -> Result<Vec<Series>> {
    let result = unwrap_data(response, "matrix")?;
    let items: Vec<MatrixItem> = serde_json::from_value(result)
        .map_err(|e| RankerError::shape(format!("malformed matrix: {}", e)))?;

    let mut series = Vec::with_capacity(items.len());
    for item in items {
        let Some(labels) = Labels::from_metric(item.metric) else {
            warn!("Dropping series without {} label", INSTANCE_TYPE_LABEL);
            continue;
        };

        let mut points = Vec::with_capacity(item.values.len());
        for (ts, raw) in &item.values {
            let time = DateTime::from_timestamp_millis((ts * 1000.0).round() as i64)
                .ok_or_else(|| RankerError::shape(format!("timestamp {} out of range", ts)))?;
            if let Some(value) = parse_price(raw)? {
                points.push(PricePoint { time, value });
            }
        }

        series.push(Series {
            instance_type: labels.instance_type,
            zone: labels.zone,
            region: labels.region,
            points,
        });
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(body: serde_json::Value) -> ApiResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_parse_vector() {
        let samples = parse_vector(response(json!({
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    {
                        "metric": {
                            "__name__": "aws_spot_instance_price",
                            "instance_type": "m5.large",
                            "zone": "use2-az1",
                            "region": "us-east-2"
                        },
                        "value": [1700000000.123, "0.05"]
                    },
                    {
                        "metric": { "instance_type": "c5.large", "region": "us-east-2" },
                        "value": [1700000000.123, "0.03"]
                    }
                ]
            }
        })))
        .unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].instance_type, "m5.large");
        assert_eq!(samples[0].zone.as_deref(), Some("use2-az1"));
        assert_eq!(samples[0].region.as_deref(), Some("us-east-2"));
        assert!((samples[0].value - 0.05).abs() < 1e-12);
        assert_eq!(samples[1].zone, None);
    }

    #[test]
    fn test_empty_vector_is_ok() {
        let samples = parse_vector(response(json!({
            "status": "success",
            "data": { "resultType": "vector", "result": [] }
        })))
        .unwrap();

        assert!(samples.is_empty());
    }

    #[test]
    fn test_matrix_for_instant_is_shape_error() {
        let result = parse_vector(response(json!({
            "status": "success",
            "data": { "resultType": "matrix", "result": [] }
        })));

        assert!(matches!(result, Err(RankerError::Shape(_))));
    }

    #[test]
    fn test_error_status_is_transport_error() {
        let result = parse_vector(response(json!({
            "status": "error",
            "errorType": "timeout",
            "error": "query timed out in expression evaluation"
        })));

        match result {
            Err(RankerError::Transport(msg)) => {
                assert!(msg.contains("timeout"));
                assert!(msg.contains("timed out"));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_prices_are_dropped() {
        let samples = parse_vector(response(json!({
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    { "metric": { "instance_type": "a" }, "value": [1.0, "NaN"] },
                    { "metric": { "instance_type": "b" }, "value": [1.0, "+Inf"] },
                    { "metric": { "instance_type": "c" }, "value": [1.0, "-0.5"] },
                    { "metric": { "zone": "use2-az1" }, "value": [1.0, "0.2"] },
                    { "metric": { "instance_type": "d" }, "value": [1.0, "0.2"] }
                ]
            },
            "warnings": ["query may be slow"]
        })))
        .unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].instance_type, "d");
    }

    #[test]
    fn test_non_numeric_value_is_shape_error() {
        let result = parse_vector(response(json!({
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [ { "metric": { "instance_type": "a" }, "value": [1.0, "cheap"] } ]
            }
        })));

        assert!(matches!(result, Err(RankerError::Shape(_))));
    }

    #[test]
    fn test_parse_matrix() {
        let series = parse_matrix(response(json!({
            "status": "success",
            "data": {
                "resultType": "matrix",
                "result": [
                    {
                        "metric": { "instance_type": "m5.large", "region": "us-east-2" },
                        "values": [[1700000000.0, "0.10"], [1700000060.0, "0.12"]]
                    }
                ]
            }
        })))
        .unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].instance_type, "m5.large");
        assert_eq!(series[0].points.len(), 2);
        assert_eq!(series[0].points[1].time.timestamp(), 1_700_000_060);
        assert!((series[0].points[1].value - 0.12).abs() < 1e-12);
    }

    #[test]
    fn test_vector_for_range_is_shape_error() {
        let result = parse_matrix(response(json!({
            "status": "success",
            "data": { "resultType": "vector", "result": [] }
        })));

        assert!(matches!(result, Err(RankerError::Shape(_))));
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = PrometheusClient::new("http://127.0.0.1:9090/", Duration::from_secs(10)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9090");
    }

    #[test]
    fn test_unix_seconds_format() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert_eq!(unix_seconds(at), "1700000000.123");
    }
}
