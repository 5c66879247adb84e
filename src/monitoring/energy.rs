use crate::config::EnergySettings;
use crate::monitoring::anomaly_detection::{AnomalyScorer, MetricType};
use crate::monitoring::metrics::{EnergyEfficiencyMetrics, MeasurementRecord};
use tracing::debug;

/// Derives `EnergyEfficiencyMetrics` from a window of readings.
#[derive(Debug, Clone)]
pub struct EnergyAnalyzer {
    settings: EnergySettings,
    scorer: AnomalyScorer,
}

impl EnergyAnalyzer {
    pub fn new(settings: EnergySettings) -> Self {
        Self {
            settings,
            scorer: AnomalyScorer::default(),
        }
    }

    /// `None` for an empty window.
    pub fn evaluate(&self, window: &[MeasurementRecord]) -> Option<EnergyEfficiencyMetrics> {
        if window.is_empty() {
            return None;
        }

        let watt_hours = energy_watt_hours(window);
        let carbon_footprint = watt_hours / 1000.0 * self.settings.carbon_kg_per_kwh;
        let efficiency_rating = self.efficiency_rating(window);
        let recommendations = self.recommendations(window, efficiency_rating);

        debug!(
            samples = window.len(),
            watt_hours,
            efficiency_rating,
            carbon_footprint,
            "Evaluated energy efficiency"
        );

        Some(EnergyEfficiencyMetrics {
            total_power_consumption: watt_hours,
            efficiency_rating,
            carbon_footprint,
            recommendations,
        })
    }

    fn efficiency_rating(&self, window: &[MeasurementRecord]) -> f64 {
        let n = window.len() as f64;
        let mean_bandwidth = window.iter().map(|r| r.bandwidth).sum::<f64>() / n;
        let mean_power = window.iter().map(|r| r.power_consumption).sum::<f64>() / n;

        if mean_power <= 0.0 {
            return if mean_bandwidth > 0.0 { 1.0 } else { 0.0 };
        }
        (mean_bandwidth / mean_power / self.settings.target_bytes_per_watt).clamp(0.0, 1.0)
    }

    fn recommendations(&self, window: &[MeasurementRecord], rating: f64) -> Vec<String> {
        let mut recommendations = Vec::new();

        let peak = window
            .iter()
            .map(|r| r.power_consumption)
            .fold(0.0_f64, f64::max);
        if peak > self.settings.peak_power_threshold_watts {
            recommendations.push("Implement load balancing to reduce peak power consumption".to_string());
            recommendations.push("Stagger equipment startup to reduce inrush current".to_string());
        }

        if window.len() >= self.settings.min_samples_for_anomaly {
            if let Ok(z) = self.scorer.z_score(window, MetricType::Power) {
                if z.abs() > self.settings.power_z_threshold {
                    let severity = if z.abs() > 3.0 { "high" } else { "medium" };
                    recommendations.push(format!(
                        "Investigate {} severity power anomaly (z-score {:.2})",
                        severity, z
                    ));
                }
            }
        }

        if rating < 0.5 {
            recommendations.push("Replace older equipment with energy-efficient models".to_string());
        }

        recommendations
    }
}

/// Left Riemann sum of power over the gaps between consecutive readings.
fn energy_watt_hours(window: &[MeasurementRecord]) -> f64 {
    window
        .windows(2)
        .map(|pair| {
            let hours = (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64 / 3_600_000.0;
            pair[0].power_consumption * hours.max(0.0)
        })
        .sum()
}
