//! Command implementations.

pub mod placement;
pub mod run;

use gridsim_core::{ApplicationConfig, SimSettings, TopologyConfig};

/// Load the settings and topology documents, exiting with a diagnostic on
/// failure.
pub fn load_world(settings_path: &str, topology_path: &str) -> (SimSettings, TopologyConfig) {
    let settings = SimSettings::load(settings_path).unwrap_or_else(|e| {
        eprintln!("Error: {settings_path}: {e}");
        std::process::exit(1);
    });
    let topology = TopologyConfig::load(topology_path).unwrap_or_else(|e| {
        eprintln!("Error: {topology_path}: {e}");
        std::process::exit(1);
    });
    (settings, topology)
}

/// Load the application document, exiting with a diagnostic on failure.
pub fn load_application(path: &str) -> ApplicationConfig {
    ApplicationConfig::load(path).unwrap_or_else(|e| {
        eprintln!("Error: {path}: {e}");
        std::process::exit(1);
    })
}
