use crate::config::{AnomalySettings, BaselineMode};
use crate::errors::DegenerateInputError;
use crate::monitoring::metrics::MeasurementRecord;
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Latency,
    Bandwidth,
    Power,
}

impl MetricType {
    pub fn name(self) -> &'static str {
        match self {
            MetricType::Latency => "latency",
            MetricType::Bandwidth => "bandwidth",
            MetricType::Power => "power_consumption",
        }
    }

    pub fn value_of(self, record: &MeasurementRecord) -> f64 {
        match self {
            MetricType::Latency => record.latency,
            MetricType::Bandwidth => record.bandwidth,
            MetricType::Power => record.power_consumption,
        }
    }
}

/// Normalized deviation of the newest reading from its window's mean.
///
/// Windows holding a negative or non-finite reading are rejected as
/// degenerate, so a successful score is always `>= 0`.
///
/// With the inclusive baseline (the default) the newest reading is part of
/// the mean it is compared against. The exclusive baseline compares it
/// against the preceding readings only, which needs at least two readings.
#[derive(Debug, Clone)]
pub struct AnomalyScorer {
    baseline: BaselineMode,
}

impl Default for AnomalyScorer {
    fn default() -> Self {
        Self {
            baseline: BaselineMode::Inclusive,
        }
    }
}

impl AnomalyScorer {
    pub fn new(baseline: BaselineMode) -> Self {
        Self { baseline }
    }

    pub fn from_settings(settings: &AnomalySettings) -> Self {
        Self::new(settings.baseline)
    }

    /// `|last.latency - mean| / mean` over `window`.
    pub fn score(&self, window: &[MeasurementRecord]) -> Result<f64, DegenerateInputError> {
        self.score_metric(window, MetricType::Latency)
    }

    pub fn bandwidth_score(&self, window: &[MeasurementRecord]) -> Result<f64, DegenerateInputError> {
        self.score_metric(window, MetricType::Bandwidth)
    }

    pub fn score_metric(
        &self,
        window: &[MeasurementRecord],
        metric: MetricType,
    ) -> Result<f64, DegenerateInputError> {
        let (last, earlier) = window
            .split_last()
            .ok_or(DegenerateInputError::EmptyWindow)?;
        check_readings(window, metric)?;

        let baseline_values: &[MeasurementRecord] = match self.baseline {
            BaselineMode::Inclusive => window,
            BaselineMode::Exclusive => earlier,
        };
        if baseline_values.is_empty() {
            return Err(DegenerateInputError::EmptyWindow);
        }

        let mean = mean_of(baseline_values, metric);
        if mean == 0.0 {
            return Err(DegenerateInputError::ZeroBaseline {
                metric: metric.name(),
            });
        }

        let score = (metric.value_of(last) - mean).abs() / mean;
        trace!(
            metric = metric.name(),
            samples = window.len(),
            mean,
            score,
            "Scored window"
        );
        Ok(score)
    }

    /// Population z-score of the newest reading; 0 when the window has no
    /// spread.
    pub fn z_score(
        &self,
        window: &[MeasurementRecord],
        metric: MetricType,
    ) -> Result<f64, DegenerateInputError> {
        let last = window.last().ok_or(DegenerateInputError::EmptyWindow)?;
        check_readings(window, metric)?;
        let mean = mean_of(window, metric);
        let variance = window
            .iter()
            .map(|r| (metric.value_of(r) - mean).powi(2))
            .sum::<f64>()
            / window.len() as f64;
        let stddev = variance.sqrt();

        if stddev < 1e-10 {
            return Ok(0.0);
        }
        Ok((metric.value_of(last) - mean) / stddev)
    }
}

fn check_readings(records: &[MeasurementRecord], metric: MetricType) -> Result<(), DegenerateInputError> {
    let valid = records.iter().all(|r| {
        let value = metric.value_of(r);
        value.is_finite() && value >= 0.0
    });
    if valid {
        Ok(())
    } else {
        Err(DegenerateInputError::InvalidReading {
            metric: metric.name(),
        })
    }
}

fn mean_of(records: &[MeasurementRecord], metric: MetricType) -> f64 {
    records.iter().map(|r| metric.value_of(r)).sum::<f64>() / records.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rand::Rng;

    fn window(latencies: &[f64]) -> Vec<MeasurementRecord> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        latencies
            .iter()
            .enumerate()
            .map(|(i, &latency)| {
                MeasurementRecord::new("edge-1", start + Duration::hours(i as i64), 500.0, latency, 80.0)
            })
            .collect()
    }

    #[test]
    fn spike_at_end_of_constant_window() {
        let mut latencies = vec![10.0; 23];
        latencies.push(20.0);

        let score = AnomalyScorer::default().score(&window(&latencies)).unwrap();
        let mean = (23.0 * 10.0 + 20.0) / 24.0;
        assert!((score - (20.0 - mean) / mean).abs() < 1e-12);
        assert!((score - 0.92).abs() < 0.01);
    }

    #[test]
    fn constant_window_scores_zero() {
        let score = AnomalyScorer::default().score(&window(&[7.0; 24])).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn zero_mean_latency_is_degenerate() {
        let err = AnomalyScorer::default().score(&window(&[0.0; 5])).unwrap_err();
        assert_eq!(err, DegenerateInputError::ZeroBaseline { metric: "latency" });
    }

    #[test]
    fn negative_and_nan_readings_are_degenerate() {
        let scorer = AnomalyScorer::default();
        let invalid = DegenerateInputError::InvalidReading { metric: "latency" };

        assert_eq!(scorer.score(&window(&[-10.0, -20.0])).unwrap_err(), invalid);
        assert_eq!(scorer.score(&window(&[10.0, f64::NAN])).unwrap_err(), invalid);
        assert_eq!(
            scorer
                .z_score(&window(&[1.0, -1.0, 3.0]), MetricType::Latency)
                .unwrap_err(),
            invalid
        );
    }

    #[test]
    fn empty_window_is_degenerate() {
        assert_eq!(
            AnomalyScorer::default().score(&[]).unwrap_err(),
            DegenerateInputError::EmptyWindow
        );
    }

    #[test]
    fn exclusive_baseline_ignores_latest_point() {
        let mut latencies = vec![10.0; 23];
        latencies.push(20.0);

        let scorer = AnomalyScorer::new(BaselineMode::Exclusive);
        assert!((scorer.score(&window(&latencies)).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(
            scorer.score(&window(&[10.0])).unwrap_err(),
            DegenerateInputError::EmptyWindow
        );
    }

    #[test]
    fn score_is_non_negative_for_random_windows() {
        let mut rng = rand::thread_rng();
        let scorer = AnomalyScorer::default();
        for _ in 0..200 {
            let len = rng.gen_range(1..=48);
            let latencies: Vec<f64> = (0..len).map(|_| rng.gen_range(0.1..500.0)).collect();
            let score = scorer.score(&window(&latencies)).unwrap();
            assert!(score >= 0.0);
        }
    }

    #[test]
    fn bandwidth_score_uses_bandwidth_column() {
        let mut records = window(&[10.0; 4]);
        records[3].bandwidth = 1_000.0;
        let score = AnomalyScorer::default().bandwidth_score(&records).unwrap();
        // mean = 625, |1000 - 625| / 625
        assert!((score - 0.6).abs() < 1e-12);
    }

    #[test]
    fn z_score_flat_window_is_zero() {
        let scorer = AnomalyScorer::default();
        assert_eq!(scorer.z_score(&window(&[3.0; 6]), MetricType::Latency).unwrap(), 0.0);

        let z = scorer
            .z_score(&window(&[1.0, 1.0, 1.0, 5.0]), MetricType::Latency)
            .unwrap();
        assert!(z > 1.7);
    }
}
