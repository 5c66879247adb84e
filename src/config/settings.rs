/*
* Analytics pipeline configuration
* --------------------------------
* Layers, lowest to highest priority:
*   1. hard-coded defaults (`Settings::default()`)
*   2. `<CONFIG_PATH>/default.{toml,yaml,json}` (optional)
*   3. `<CONFIG_PATH>/local.{toml,yaml,json}` (optional)
*   4. environment variables, `TELEMETRY__<SECTION>__<KEY>`
*
* Settings are read once at startup and handed to each component by value.
* Nothing below is consulted after construction.
*/

use crate::errors::ConfigError;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

const ENV_PREFIX: &str = "TELEMETRY";
const MAX_MAINTENANCE_INTERVAL_HOURS: u64 = 10 * 365 * 24;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub anomaly: AnomalySettings,
    pub maintenance: MaintenanceSettings,
    pub cost: CostSettings,
    pub energy: EnergySettings,
    pub collection: CollectionSettings,
}

/// Whether the newest reading contributes to its own baseline mean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineMode {
    #[default]
    Inclusive,
    Exclusive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalySettings {
    pub threshold_anomaly_score: f64,
    pub window_size: usize,
    pub baseline: BaselineMode,
}

impl Default for AnomalySettings {
    fn default() -> Self {
        Self {
            threshold_anomaly_score: 0.8,
            window_size: 24,
            baseline: BaselineMode::Inclusive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceSettings {
    pub base_interval_hours: u64,
    pub min_interval_hours: u64,
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self {
            base_interval_hours: 30 * 24,
            min_interval_hours: 24,
        }
    }
}

impl MaintenanceSettings {
    pub fn base_interval(&self) -> chrono::Duration {
        hours_saturating(self.base_interval_hours)
    }

    pub fn min_interval(&self) -> chrono::Duration {
        hours_saturating(self.min_interval_hours)
    }
}

fn hours_saturating(hours: u64) -> chrono::Duration {
    i64::try_from(hours)
        .ok()
        .and_then(chrono::Duration::try_hours)
        .unwrap_or(chrono::Duration::MAX)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostSettings {
    pub rate_per_kwh: f64,
    pub savings_factor: f64,
    pub cost_ceiling: f64,
    pub peak_power_threshold_watts: f64,
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            rate_per_kwh: 0.12,
            savings_factor: 0.30,
            cost_ceiling: 1000.0,
            peak_power_threshold_watts: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergySettings {
    pub target_bytes_per_watt: f64,
    pub carbon_kg_per_kwh: f64,
    pub peak_power_threshold_watts: f64,
    pub power_z_threshold: f64,
    pub min_samples_for_anomaly: usize,
}

impl Default for EnergySettings {
    fn default() -> Self {
        Self {
            target_bytes_per_watt: 1_000_000.0,
            carbon_kg_per_kwh: 0.4,
            peak_power_threshold_watts: 1000.0,
            power_z_threshold: 2.0,
            min_samples_for_anomaly: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub interval_secs: u64,
    pub attach_energy_metrics: bool,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            interval_secs: 60,
            attach_energy_metrics: true,
        }
    }
}

impl CollectionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Settings {
    /// Loads the layered configuration rooted at `$CONFIG_PATH` (default `config`).
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string());

        info!("Loading configuration from path: {}", config_path);

        let config = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name(&format!("{}/default", config_path)).required(false))
            .add_source(File::with_name(&format!("{}/local", config_path)).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults overlaid with an in-memory TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(key: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                key,
                reason: reason.into(),
            })
        }

        let anomaly = &self.anomaly;
        if !(anomaly.threshold_anomaly_score.is_finite() && anomaly.threshold_anomaly_score >= 0.0) {
            return invalid("anomaly.threshold_anomaly_score", "must be a finite number >= 0");
        }
        if anomaly.window_size == 0 {
            return invalid("anomaly.window_size", "must be at least 1");
        }

        if self.maintenance.base_interval_hours > MAX_MAINTENANCE_INTERVAL_HOURS {
            return invalid(
                "maintenance.base_interval_hours",
                format!("must not exceed {} (10 years)", MAX_MAINTENANCE_INTERVAL_HOURS),
            );
        }
        if self.maintenance.min_interval_hours > self.maintenance.base_interval_hours {
            return invalid(
                "maintenance.min_interval_hours",
                "must not exceed maintenance.base_interval_hours",
            );
        }

        let cost = &self.cost;
        if !(cost.rate_per_kwh.is_finite() && cost.rate_per_kwh >= 0.0) {
            return invalid("cost.rate_per_kwh", "must be a finite number >= 0");
        }
        if !(0.0..=1.0).contains(&cost.savings_factor) {
            return invalid("cost.savings_factor", format!("{} is outside [0, 1]", cost.savings_factor));
        }

        if !(self.energy.target_bytes_per_watt > 0.0) {
            return invalid("energy.target_bytes_per_watt", "must be > 0");
        }
        if self.energy.carbon_kg_per_kwh < 0.0 {
            return invalid("energy.carbon_kg_per_kwh", "must be >= 0");
        }

        if self.collection.timeout_ms == 0 {
            return invalid("collection.timeout_ms", "must be > 0");
        }
        if self.collection.interval_secs == 0 {
            return invalid("collection.interval_secs", "must be > 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.anomaly.threshold_anomaly_score, 0.8);
        assert_eq!(settings.anomaly.window_size, 24);
        assert_eq!(settings.anomaly.baseline, BaselineMode::Inclusive);
        assert_eq!(settings.cost.rate_per_kwh, 0.12);
        assert_eq!(settings.cost.savings_factor, 0.30);
        assert_eq!(settings.maintenance.base_interval(), chrono::Duration::days(30));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn toml_overrides_only_named_keys() {
        let settings = Settings::from_toml_str(
            r#"
            [cost]
            rate_per_kwh = 0.2

            [anomaly]
            baseline = "exclusive"
            "#,
        )
        .unwrap();

        assert_eq!(settings.cost.rate_per_kwh, 0.2);
        assert_eq!(settings.cost.savings_factor, 0.30);
        assert_eq!(settings.anomaly.baseline, BaselineMode::Exclusive);
        assert_eq!(settings.anomaly.window_size, 24);
    }

    #[test]
    fn rejects_out_of_range_savings_factor() {
        let err = Settings::from_toml_str("[cost]\nsavings_factor = 1.5\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "cost.savings_factor", .. }
        ));
    }

    #[test]
    fn rejects_unbounded_maintenance_interval() {
        let err = Settings::from_toml_str("[maintenance]\nbase_interval_hours = 10000000000000000\n")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "maintenance.base_interval_hours", .. }
        ));

        let ten_years = Settings::from_toml_str("[maintenance]\nbase_interval_hours = 87600\n").unwrap();
        assert_eq!(ten_years.maintenance.base_interval(), chrono::Duration::days(3650));
    }

    #[test]
    fn interval_accessors_saturate_instead_of_panicking() {
        let maintenance = MaintenanceSettings {
            base_interval_hours: u64::MAX,
            min_interval_hours: 1u64 << 62,
        };
        assert_eq!(maintenance.base_interval(), chrono::Duration::MAX);
        assert_eq!(maintenance.min_interval(), chrono::Duration::MAX);
    }

    #[test]
    fn rejects_zero_window() {
        let mut settings = Settings::default();
        settings.anomaly.window_size = 0;
        assert!(settings.validate().is_err());
    }
}
