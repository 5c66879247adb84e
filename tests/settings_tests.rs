// Layered configuration: defaults < default.toml < local.toml < environment.

use anyhow::Result;
use node_telemetry_analytics::errors::ConfigError;
use node_telemetry_analytics::Settings;
use std::fs;

#[test]
fn files_and_environment_are_layered_in_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(
        dir.path().join("default.toml"),
        "[cost]\nsavings_factor = 0.25\nrate_per_kwh = 0.15\n\n[anomaly]\nwindow_size = 48\n",
    )?;
    fs::write(dir.path().join("local.toml"), "[anomaly]\nwindow_size = 12\n")?;

    // Env vars are process-wide; this binary holds the only test touching them.
    std::env::set_var("CONFIG_PATH", dir.path());
    std::env::set_var("TELEMETRY__COST__RATE_PER_KWH", "0.2");
    let loaded = Settings::new();

    std::env::set_var("TELEMETRY__MAINTENANCE__BASE_INTERVAL_HOURS", "10000000000");
    let oversized = Settings::new();

    std::env::remove_var("TELEMETRY__MAINTENANCE__BASE_INTERVAL_HOURS");
    std::env::remove_var("TELEMETRY__COST__RATE_PER_KWH");
    std::env::remove_var("CONFIG_PATH");

    let settings = loaded?;
    // default.toml
    assert_eq!(settings.cost.savings_factor, 0.25);
    // local.toml wins over default.toml
    assert_eq!(settings.anomaly.window_size, 12);
    // environment wins over both files
    assert_eq!(settings.cost.rate_per_kwh, 0.2);
    // untouched keys keep their defaults
    assert_eq!(settings.anomaly.threshold_anomaly_score, 0.8);
    assert_eq!(settings.maintenance.base_interval_hours, 720);
    assert!(settings.collection.attach_energy_metrics);

    assert!(matches!(
        oversized,
        Err(ConfigError::Invalid {
            key: "maintenance.base_interval_hours",
            ..
        })
    ));
    Ok(())
}
