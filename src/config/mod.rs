pub mod settings;

pub use settings::{
    AnomalySettings, BaselineMode, CollectionSettings, CostSettings, EnergySettings,
    MaintenanceSettings, Settings,
};
