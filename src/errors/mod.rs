pub mod handlers;

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Validation Error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Degenerate Input: {0}")]
    DegenerateInput(#[from] DegenerateInputError),

    #[error("Collection Error: {0}")]
    Collection(#[from] CollectionError),

    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("node id must not be empty")]
    EmptyNodeId,

    #[error("{field} must be >= 0, got {value}")]
    NegativeValue {
        field: &'static str,
        value: f64,
    },

    #[error("{field} must be a finite number")]
    NonFinite {
        field: &'static str,
    },

    #[error("record for {node_id} at {attempted} precedes last stored record at {last}")]
    OutOfOrder {
        node_id: String,
        last: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },

    #[error("{operation} requires at least one measurement")]
    EmptyInput {
        operation: &'static str,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DegenerateInputError {
    #[error("window contains no usable measurements")]
    EmptyWindow,

    #[error("window holds a negative or non-finite {metric} reading")]
    InvalidReading {
        metric: &'static str,
    },

    #[error("baseline mean of {metric} is zero")]
    ZeroBaseline {
        metric: &'static str,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("metrics source unavailable: {message}")]
pub struct SourceUnavailableError {
    pub message: String,
}

impl SourceUnavailableError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("sampling {node_id} failed: {source}")]
    Source {
        node_id: String,
        #[source]
        source: SourceUnavailableError,
    },

    #[error("sampling {node_id} timed out after {after:?}")]
    Timeout {
        node_id: String,
        after: Duration,
    },

    #[error("sample for {node_id} rejected: {source}")]
    Rejected {
        node_id: String,
        #[source]
        source: ValidationError,
    },
}

impl CollectionError {
    /// Source outages and timeouts may succeed on a later attempt; a rejected
    /// sample will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Source { .. } | Self::Timeout { .. })
    }

    pub fn node_id(&self) -> &str {
        match self {
            Self::Source { node_id, .. }
            | Self::Timeout { node_id, .. }
            | Self::Rejected { node_id, .. } => node_id,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for {key}: {reason}")]
    Invalid {
        key: &'static str,
        reason: String,
    },
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
