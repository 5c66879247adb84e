pub mod billing;
pub mod config;
pub mod errors;
pub mod logging;
pub mod maintenance;
pub mod monitoring;
pub mod pipeline;

// Re-exports
pub use billing::{CostAnalyzer, CostOptimization};
pub use crate::config::Settings;
pub use errors::{AnalyticsError, AnalyticsResult};
pub use logging::init_tracing;
pub use maintenance::{MaintenancePrediction, MaintenancePredictor};
pub use monitoring::{AnomalyScorer, EnergyAnalyzer, EnergyEfficiencyMetrics, MeasurementRecord, MetricsStore};
pub use pipeline::{MetricsSource, NodeReport, PipelineCoordinator, RawSample};
pub type AsyncMutex<T> = tokio::sync::Mutex<T>;
