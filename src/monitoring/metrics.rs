/*
* Per-node measurement history.
*
* Each node owns an append-only log of `MeasurementRecord`s kept in
* non-decreasing timestamp order. Writers to one node are serialized by that
* node's lock; nodes never contend with each other once their log exists.
*
* Readers take a `HistorySnapshot`: a shared handle to the log as it was at
* that instant. An append that races a live snapshot copies the log first so
* the snapshot never observes the new record.
*/

use crate::errors::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    /// Bytes per second.
    pub bandwidth: f64,
    /// Milliseconds, process-wide.
    pub latency: f64,
    /// Watts, pre-normalized to the billing interval.
    pub power_consumption: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_efficiency: Option<EnergyEfficiencyMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyEfficiencyMetrics {
    /// Watt-hours accumulated over the evaluated window.
    pub total_power_consumption: f64,
    /// 0.0 (poor) to 1.0 (on target).
    pub efficiency_rating: f64,
    /// kg CO2-equivalent.
    pub carbon_footprint: f64,
    pub recommendations: Vec<String>,
}

impl MeasurementRecord {
    pub fn new(
        node_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        bandwidth: f64,
        latency: f64,
        power_consumption: f64,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            timestamp,
            bandwidth,
            latency,
            power_consumption,
            energy_efficiency: None,
        }
    }

    pub fn with_energy_efficiency(mut self, metrics: EnergyEfficiencyMetrics) -> Self {
        self.energy_efficiency = Some(metrics);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.node_id.trim().is_empty() {
            return Err(ValidationError::EmptyNodeId);
        }
        for (field, value) in [
            ("bandwidth", self.bandwidth),
            ("latency", self.latency),
            ("power_consumption", self.power_consumption),
        ] {
            if value.is_nan() || value.is_infinite() {
                return Err(ValidationError::NonFinite { field });
            }
            if value < 0.0 {
                return Err(ValidationError::NegativeValue { field, value });
            }
        }
        Ok(())
    }
}

/// Immutable view of one node's history at the time it was taken.
#[derive(Debug, Clone, Default)]
pub struct HistorySnapshot {
    records: Arc<Vec<MeasurementRecord>>,
}

impl HistorySnapshot {
    /// The newest `count` records, oldest first.
    pub fn recent(&self, count: usize) -> &[MeasurementRecord] {
        let start = self.records.len().saturating_sub(count);
        &self.records[start..]
    }

    pub fn latest(&self) -> Option<&MeasurementRecord> {
        self.records.last()
    }
}

impl Deref for HistorySnapshot {
    type Target = [MeasurementRecord];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

#[derive(Debug, Default)]
struct NodeLog {
    records: Mutex<Arc<Vec<MeasurementRecord>>>,
}

#[derive(Debug, Default)]
pub struct MetricsStore {
    nodes: RwLock<HashMap<String, Arc<NodeLog>>>,
}

impl MetricsStore {
    pub fn new() -> Self {
        info!("Initializing metrics store");
        Self::default()
    }

    /// Validates and appends `record` to its node's history. A rejected
    /// record leaves the history untouched.
    pub fn append(&self, record: MeasurementRecord) -> Result<(), ValidationError> {
        record.validate()?;

        let log = self.log_for_write(&record.node_id);
        let mut records = log.records.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(last) = records.last() {
            if record.timestamp < last.timestamp {
                return Err(ValidationError::OutOfOrder {
                    node_id: record.node_id,
                    last: last.timestamp,
                    attempted: record.timestamp,
                });
            }
        }

        debug!(
            node_id = %record.node_id,
            timestamp = %record.timestamp,
            latency = record.latency,
            bandwidth = record.bandwidth,
            power = record.power_consumption,
            "Appending measurement"
        );
        Arc::make_mut(&mut records).push(record);
        Ok(())
    }

    /// The most recent `count` records for `node_id`, oldest first. Unknown
    /// nodes yield an empty sequence.
    pub fn recent_window(&self, node_id: &str, count: usize) -> Vec<MeasurementRecord> {
        self.snapshot(node_id).recent(count).to_vec()
    }

    /// Full ordered history for `node_id`.
    pub fn all(&self, node_id: &str) -> Vec<MeasurementRecord> {
        self.snapshot(node_id).to_vec()
    }

    /// Stable view of `node_id`'s history without copying records.
    pub fn snapshot(&self, node_id: &str) -> HistorySnapshot {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        match nodes.get(node_id) {
            Some(log) => HistorySnapshot {
                records: Arc::clone(&log.records.lock().unwrap_or_else(PoisonError::into_inner)),
            },
            None => HistorySnapshot::default(),
        }
    }

    pub fn latest_timestamp(&self, node_id: &str) -> Option<DateTime<Utc>> {
        self.snapshot(node_id).latest().map(|r| r.timestamp)
    }

    pub fn len(&self, node_id: &str) -> usize {
        self.snapshot(node_id).len()
    }

    pub fn node_ids(&self) -> Vec<String> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn log_for_write(&self, node_id: &str) -> Arc<NodeLog> {
        if let Some(log) = self
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(node_id)
        {
            return Arc::clone(log);
        }

        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(nodes.entry(node_id.to_string()).or_insert_with(|| {
            info!(node_id, "Tracking new node");
            Arc::default()
        }))
    }
}
