use crate::billing::{CostAnalyzer, CostOptimization};
use crate::config::Settings;
use crate::errors::handlers::RetryPolicy;
use crate::errors::{AnalyticsResult, CollectionError, ConfigError, ValidationError};
use crate::maintenance::{MaintenancePrediction, MaintenancePredictor};
use crate::monitoring::anomaly_detection::AnomalyScorer;
use crate::monitoring::energy::EnergyAnalyzer;
use crate::monitoring::metrics::{EnergyEfficiencyMetrics, MeasurementRecord, MetricsStore};
use crate::pipeline::source::{MetricsSource, RawSample};
use crate::AsyncMutex;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, info};

/// Everything the pipeline exposes about one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub node_id: String,
    pub samples: usize,
    pub maintenance: MaintenancePrediction,
    pub cost: CostOptimization,
    pub energy: Option<EnergyEfficiencyMetrics>,
    pub latency_anomaly: Option<f64>,
    pub bandwidth_anomaly: Option<f64>,
}

impl NodeReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub struct PipelineCoordinator {
    source: Arc<dyn MetricsSource>,
    store: Arc<MetricsStore>,
    scorer: AnomalyScorer,
    predictor: MaintenancePredictor,
    cost: CostAnalyzer,
    energy: EnergyAnalyzer,
    retry: RetryPolicy,
    timeout: Duration,
    interval: Duration,
    window_size: usize,
    attach_energy_metrics: bool,
    collection_guards: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PipelineCoordinator {
    pub fn new(
        settings: &Settings,
        source: Arc<dyn MetricsSource>,
        store: Arc<MetricsStore>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;

        let collection = &settings.collection;
        info!(
            window_size = settings.anomaly.window_size,
            threshold = settings.anomaly.threshold_anomaly_score,
            rate_per_kwh = settings.cost.rate_per_kwh,
            timeout_ms = collection.timeout_ms,
            "Initializing pipeline coordinator"
        );

        Ok(Self {
            source,
            store,
            scorer: AnomalyScorer::from_settings(&settings.anomaly),
            predictor: MaintenancePredictor::new(&settings.anomaly, &settings.maintenance),
            cost: CostAnalyzer::new(settings.cost.clone()),
            energy: EnergyAnalyzer::new(settings.energy.clone()),
            retry: RetryPolicy::new(
                collection.max_attempts,
                Duration::from_millis(collection.initial_backoff_ms),
                Duration::from_millis(collection.max_backoff_ms),
            ),
            timeout: collection.timeout(),
            interval: collection.interval(),
            window_size: settings.anomaly.window_size,
            attach_energy_metrics: collection.attach_energy_metrics,
            collection_guards: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &Arc<MetricsStore> {
        &self.store
    }

    /// Samples `node_id`, timestamps the reading and appends it. Nothing is
    /// stored unless the whole record is valid.
    pub async fn collect_and_store(&self, node_id: &str) -> Result<MeasurementRecord, CollectionError> {
        if node_id.trim().is_empty() {
            return Err(CollectionError::Rejected {
                node_id: node_id.to_string(),
                source: ValidationError::EmptyNodeId,
            });
        }

        let guard = self.collection_guard(node_id);
        let _serialized = guard.lock().await;

        let sample = self.retry.run(move || self.sample_once(node_id)).await?;
        let record = self.build_record(node_id, sample);

        self.store
            .append(record.clone())
            .map_err(|source| CollectionError::Rejected {
                node_id: node_id.to_string(),
                source,
            })?;

        info!(
            node_id,
            latency = record.latency,
            bandwidth = record.bandwidth,
            power = record.power_consumption,
            "Stored measurement"
        );
        Ok(record)
    }

    /// Maintenance, cost and energy analysis over the node's current history.
    /// Repeated calls without an intervening append return equal reports.
    pub fn build_reports(&self, node_id: &str) -> AnalyticsResult<NodeReport> {
        let history = self.store.snapshot(node_id);

        let cost = self.cost.analyze(&history)?;
        let maintenance = self.predictor.predict(&history);

        let window = history.recent(self.window_size);
        let report = NodeReport {
            node_id: node_id.to_string(),
            samples: history.len(),
            maintenance,
            cost,
            energy: self.energy.evaluate(window),
            latency_anomaly: self.scorer.score(window).ok(),
            bandwidth_anomaly: self.scorer.bandwidth_score(window).ok(),
        };

        info!(
            node_id,
            samples = report.samples,
            needs_maintenance = report.maintenance.needs_maintenance,
            risk = report.maintenance.risk,
            current_cost = report.cost.current_cost,
            "Built node report"
        );
        Ok(report)
    }

    /// Collects `node_id` every `collection.interval_secs` until the returned
    /// handle is aborted. Failed rounds are logged and the loop continues.
    pub fn spawn_collection(self: &Arc<Self>, node_id: String) -> JoinHandle<()> {
        info!(node_id = %node_id, interval_secs = self.interval.as_secs(), "Starting periodic collection");

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval_timer = time::interval(coordinator.interval);
            interval_timer.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                interval_timer.tick().await;
                if let Err(e) = coordinator.collect_and_store(&node_id).await {
                    error!("Failed to collect metrics for node {}: {}", node_id, e);
                }
            }
        })
    }

    async fn sample_once(&self, node_id: &str) -> Result<RawSample, CollectionError> {
        match time::timeout(self.timeout, self.source.sample(node_id)).await {
            Ok(Ok(sample)) => Ok(sample),
            Ok(Err(source)) => Err(CollectionError::Source {
                node_id: node_id.to_string(),
                source,
            }),
            Err(_) => Err(CollectionError::Timeout {
                node_id: node_id.to_string(),
                after: self.timeout,
            }),
        }
    }

    fn build_record(&self, node_id: &str, sample: RawSample) -> MeasurementRecord {
        let history = self.store.snapshot(node_id);

        // Wall clock may step backwards; history order may not.
        let now = Utc::now();
        let timestamp = history.latest().map_or(now, |last| last.timestamp.max(now));

        let record = MeasurementRecord::new(
            node_id,
            timestamp,
            sample.bandwidth,
            sample.latency,
            sample.power_consumption,
        );

        if !self.attach_energy_metrics || record.validate().is_err() {
            return record;
        }

        let mut window = history.recent(self.window_size.saturating_sub(1)).to_vec();
        window.push(record.clone());
        match self.energy.evaluate(&window) {
            Some(metrics) => record.with_energy_efficiency(metrics),
            None => record,
        }
    }

    fn collection_guard(&self, node_id: &str) -> Arc<AsyncMutex<()>> {
        let mut guards = self
            .collection_guards
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(guards.entry(node_id.to_string()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceUnavailableError;
    use async_trait::async_trait;

    struct FixedSource(RawSample);

    #[async_trait]
    impl MetricsSource for FixedSource {
        async fn sample(&self, _node_id: &str) -> Result<RawSample, SourceUnavailableError> {
            Ok(self.0)
        }
    }

    fn coordinator(sample: RawSample) -> PipelineCoordinator {
        PipelineCoordinator::new(
            &Settings::default(),
            Arc::new(FixedSource(sample)),
            Arc::new(MetricsStore::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn collected_records_carry_energy_metrics() {
        let coordinator = coordinator(RawSample::new(5e8, 12.0, 150.0));

        coordinator.collect_and_store("edge-1").await.unwrap();
        let record = coordinator.collect_and_store("edge-1").await.unwrap();

        assert!(record.energy_efficiency.is_some());
        assert_eq!(coordinator.store().len("edge-1"), 2);
    }

    #[tokio::test]
    async fn energy_metrics_can_be_switched_off() {
        let mut settings = Settings::default();
        settings.collection.attach_energy_metrics = false;
        let coordinator = PipelineCoordinator::new(
            &settings,
            Arc::new(FixedSource(RawSample::new(5e8, 12.0, 150.0))),
            Arc::new(MetricsStore::new()),
        )
        .unwrap();

        for _ in 0..3 {
            let record = coordinator.collect_and_store("edge-1").await.unwrap();
            assert!(record.energy_efficiency.is_none());
        }
        assert!(coordinator
            .store()
            .all("edge-1")
            .iter()
            .all(|r| r.energy_efficiency.is_none()));
    }

    #[tokio::test]
    async fn timestamps_never_go_backwards() {
        let coordinator = coordinator(RawSample::new(1.0, 1.0, 1.0));
        for _ in 0..5 {
            coordinator.collect_and_store("edge-1").await.unwrap();
        }

        let history = coordinator.store().all("edge-1");
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn empty_node_id_is_rejected() {
        let coordinator = coordinator(RawSample::new(1.0, 1.0, 1.0));
        let err = coordinator.collect_and_store("").await.unwrap_err();
        assert!(matches!(
            err,
            CollectionError::Rejected {
                source: ValidationError::EmptyNodeId,
                ..
            }
        ));
    }

    #[test]
    fn invalid_settings_are_refused() {
        let mut settings = Settings::default();
        settings.cost.savings_factor = -0.1;
        let result = PipelineCoordinator::new(
            &settings,
            Arc::new(FixedSource(RawSample::new(1.0, 1.0, 1.0))),
            Arc::new(MetricsStore::new()),
        );
        assert!(result.is_err());
    }
}
