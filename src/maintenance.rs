use crate::config::{AnomalySettings, MaintenanceSettings};
use crate::errors::DegenerateInputError;
use crate::monitoring::anomaly_detection::AnomalyScorer;
use crate::monitoring::metrics::MeasurementRecord;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenancePrediction {
    pub needs_maintenance: bool,
    pub next_maintenance_date: DateTime<Utc>,
    /// 0.0 to 1.0.
    pub risk: f64,
    /// `None` when the window could not be scored.
    pub anomaly_score: Option<f64>,
    pub recommended_actions: Vec<String>,
}

/// Latency-anomaly driven maintenance scheduling.
///
/// Risk is the anomaly score clamped to `[0, 1]`. The next maintenance
/// date is the evaluation instant plus `max(base * (1 - risk), min)`, so a
/// riskier node is never scheduled later than a healthier one.
#[derive(Debug, Clone)]
pub struct MaintenancePredictor {
    scorer: AnomalyScorer,
    threshold: f64,
    window_size: usize,
    base_interval: Duration,
    min_interval: Duration,
}

impl MaintenancePredictor {
    pub fn new(anomaly: &AnomalySettings, maintenance: &MaintenanceSettings) -> Self {
        Self {
            scorer: AnomalyScorer::from_settings(anomaly),
            threshold: anomaly.threshold_anomaly_score,
            window_size: anomaly.window_size,
            base_interval: maintenance.base_interval(),
            min_interval: maintenance.min_interval(),
        }
    }

    /// Evaluated at the newest reading's timestamp, or now for an empty
    /// history. Unscorable windows get the fail-safe prediction.
    pub fn predict(&self, history: &[MeasurementRecord]) -> MaintenancePrediction {
        self.predict_at(history, evaluation_instant(history))
    }

    pub fn predict_at(&self, history: &[MeasurementRecord], now: DateTime<Utc>) -> MaintenancePrediction {
        match self.try_predict_at(history, now) {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!(
                    error = %e,
                    samples = history.len(),
                    "Insufficient data for maintenance prediction, using fail-safe defaults"
                );
                self.fail_safe(now)
            }
        }
    }

    pub fn try_predict(&self, history: &[MeasurementRecord]) -> Result<MaintenancePrediction, DegenerateInputError> {
        self.try_predict_at(history, evaluation_instant(history))
    }

    pub fn try_predict_at(
        &self,
        history: &[MeasurementRecord],
        now: DateTime<Utc>,
    ) -> Result<MaintenancePrediction, DegenerateInputError> {
        let start = history.len().saturating_sub(self.window_size);
        let window = &history[start..];

        let anomaly = self.scorer.score(window)?;
        let risk = risk_from_anomaly(anomaly);
        let needs_maintenance = anomaly > self.threshold;

        debug!(
            samples = window.len(),
            anomaly_score = anomaly,
            risk,
            needs_maintenance,
            "Maintenance evaluated"
        );

        Ok(MaintenancePrediction {
            needs_maintenance,
            next_maintenance_date: add_saturating(now, self.interval_for(risk)),
            risk,
            anomaly_score: Some(anomaly),
            recommended_actions: recommended_actions(risk),
        })
    }

    pub fn interval_for(&self, risk: f64) -> Duration {
        let base_ms = self.base_interval.num_milliseconds() as f64;
        let scaled = Duration::milliseconds((base_ms * (1.0 - risk.clamp(0.0, 1.0))).round() as i64);
        scaled.max(self.min_interval)
    }

    fn fail_safe(&self, now: DateTime<Utc>) -> MaintenancePrediction {
        MaintenancePrediction {
            needs_maintenance: false,
            next_maintenance_date: add_saturating(now, self.base_interval),
            risk: 0.0,
            anomaly_score: None,
            recommended_actions: Vec::new(),
        }
    }
}

fn evaluation_instant(history: &[MeasurementRecord]) -> DateTime<Utc> {
    history.last().map(|r| r.timestamp).unwrap_or_else(Utc::now)
}

fn add_saturating(now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    now.checked_add_signed(interval)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn risk_from_anomaly(anomaly: f64) -> f64 {
    if anomaly.is_nan() {
        return 0.0;
    }
    anomaly.clamp(0.0, 1.0)
}

fn recommended_actions(risk: f64) -> Vec<String> {
    let actions: &[&str] = if risk > 0.7 {
        &[
            "Immediate maintenance required",
            "Schedule emergency inspection",
            "Prepare backup systems",
        ]
    } else if risk > 0.5 {
        &[
            "Schedule maintenance within 48 hours",
            "Monitor system closely",
            "Review recent performance logs",
        ]
    } else if risk > 0.3 {
        &["Schedule routine maintenance", "Continue regular monitoring"]
    } else {
        &[
            "No immediate action required",
            "Continue regular maintenance schedule",
        ]
    };
    actions.iter().map(|a| a.to_string()).collect()
}
