//! Energy cost estimation.
//!
//! `power_consumption` is billed as if it were already an energy quantity for
//! the billing interval: each reading contributes `power_consumption *
//! rate_per_kwh`. Normalizing readings to that interval is the caller's job.

use crate::config::CostSettings;
use crate::errors::ValidationError;
use crate::monitoring::metrics::MeasurementRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostOptimization {
    pub current_cost: f64,
    pub optimized_cost: f64,
    pub projected_savings: f64,
    pub recommendations: Vec<String>,
    pub samples: usize,
}

#[derive(Debug, Clone)]
pub struct CostAnalyzer {
    settings: CostSettings,
}

impl Default for CostAnalyzer {
    fn default() -> Self {
        Self::new(CostSettings::default())
    }
}

impl CostAnalyzer {
    pub fn new(settings: CostSettings) -> Self {
        Self { settings }
    }

    pub fn analyze(&self, metrics: &[MeasurementRecord]) -> Result<CostOptimization, ValidationError> {
        if metrics.is_empty() {
            return Err(ValidationError::EmptyInput {
                operation: "cost analysis",
            });
        }
        for m in metrics {
            m.validate()?;
        }

        let current_cost = self.current_cost(metrics);
        let savings_factor = self.settings.savings_factor.clamp(0.0, 1.0);
        let optimized_cost = current_cost * (1.0 - savings_factor);
        let projected_savings = (current_cost - optimized_cost).max(0.0).min(current_cost);
        let recommendations = self.recommendations(metrics, current_cost);

        debug!(
            samples = metrics.len(),
            current_cost,
            projected_savings,
            recommendations = recommendations.len(),
            "Cost analysis complete"
        );

        Ok(CostOptimization {
            current_cost,
            optimized_cost,
            projected_savings,
            recommendations,
            samples: metrics.len(),
        })
    }

    fn current_cost(&self, metrics: &[MeasurementRecord]) -> f64 {
        metrics
            .iter()
            .map(|m| m.power_consumption * self.settings.rate_per_kwh)
            .sum()
    }

    fn recommendations(&self, metrics: &[MeasurementRecord], current_cost: f64) -> Vec<String> {
        let mut recommendations = Vec::new();

        if current_cost > self.settings.cost_ceiling {
            recommendations.push("Implement power management schedules".to_string());
            recommendations.push("Investigate renewable energy options".to_string());
        }

        let peak_readings = metrics
            .iter()
            .filter(|m| m.power_consumption > self.settings.peak_power_threshold_watts)
            .count();
        if peak_readings > 0 {
            recommendations.push(format!(
                "Reduce peak load: {} of {} readings exceeded {:.0} W",
                peak_readings,
                metrics.len(),
                self.settings.peak_power_threshold_watts
            ));
        }

        recommendations
    }
}
