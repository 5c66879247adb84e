pub mod anomaly_detection;
pub mod energy;
pub mod metrics;

pub use anomaly_detection::{AnomalyScorer, MetricType};
pub use energy::EnergyAnalyzer;
pub use metrics::{EnergyEfficiencyMetrics, HistorySnapshot, MeasurementRecord, MetricsStore};
