//! Error types for spot ranking

use thiserror::Error;

/// Result type for ranking and port operations
pub type Result<T> = std::result::Result<T, RankerError>;

/// Core error type for ranking operations
///
/// Kinds stay distinct so the retry layer can decide per kind whether
/// another attempt makes sense.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RankerError {
    /// The query could not be evaluated (connection, timeout, backend error)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The result was not in the expected sample vector/matrix form
    #[error("Unexpected result shape: {0}")]
    Shape(String),

    /// The query succeeded but returned zero samples
    #[error("No data found: {0}")]
    NoData(String),

    /// Every sample was filtered out before ranking
    #[error("No eligible entry: {0}")]
    NoEligibleEntry(String),

    /// Instance type missing from the price catalog
    #[error("Instance type {0} not found in price catalog")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RankerError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a result shape error
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    /// Create a no-data error
    pub fn no_data(msg: impl Into<String>) -> Self {
        Self::NoData(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether a later attempt could plausibly succeed.
    ///
    /// Only transport failures and not-yet-ingested data qualify.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::NoData(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RankerError::transport("connection refused").is_transient());
        assert!(RankerError::no_data("empty vector").is_transient());
        assert!(!RankerError::shape("matrix").is_transient());
        assert!(!RankerError::NoEligibleEntry("all skipped".into()).is_transient());
        assert!(!RankerError::NotFound("m5.large".into()).is_transient());
        assert!(!RankerError::config("empty region").is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = RankerError::NotFound("m5.large".to_string());
        assert_eq!(err.to_string(), "Instance type m5.large not found in price catalog");

        let err = RankerError::no_data("zone use2-az1");
        assert_eq!(err.to_string(), "No data found: zone use2-az1");
    }
}
