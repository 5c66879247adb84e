use crate::errors::SourceUnavailableError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One untimestamped reading as delivered by the measurement layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub bandwidth: f64,
    pub latency: f64,
    pub power_consumption: f64,
}

impl RawSample {
    pub fn new(bandwidth: f64, latency: f64, power_consumption: f64) -> Self {
        Self {
            bandwidth,
            latency,
            power_consumption,
        }
    }
}

/// Acquires raw bandwidth, latency and power readings for a node.
///
/// How the readings are obtained (SNMP, PDUs, agents) is up to the
/// implementation. The coordinator only sees the sample or the failure.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn sample(&self, node_id: &str) -> Result<RawSample, SourceUnavailableError>;
}
