//! Configuration loading: simulation settings, topology, application profile.
//!
//! Three documents feed a scenario:
//!
//! - `simulation.properties` — line-oriented `key = value` settings (area,
//!   device counts, per-layer link parameters, seeds, collection window).
//! - `topology.json` — edge and cloud datacenters. `TELCO` is identified by
//!   its reserved name among the edge datacenters; every other edge
//!   datacenter is a GNB. Exactly one `TSO` cloud datacenter is required.
//! - `application.json` — the single `PMU_Data` application profile mapped
//!   onto every generated sample.
//!
//! All parsing failures are fatal at startup ([`SimError::Config`]).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Reserved edge-datacenter name identifying the metropolitan hub.
pub const TELCO_NAME: &str = "TELCO";
/// Reserved cloud-datacenter name identifying the TSO cloud.
pub const TSO_NAME: &str = "TSO";

// ---------------------------------------------------------------------------
// Simulation settings (properties file)
// ---------------------------------------------------------------------------

/// Parsed simulation settings.
///
/// Fields mirror the properties keys; jitter values are converted from
/// milliseconds to seconds at parse time, the propagation coefficient from
/// μs/m to s/m.
#[derive(Debug, Clone, Serialize)]
pub struct SimSettings {
    /// Number of PMU devices.
    pub device_count: usize,
    /// Simulated duration in seconds.
    pub simulation_time: f64,
    /// Map length (y extent) in metres.
    pub length: f64,
    /// Map width (x extent) in metres.
    pub width: f64,
    /// PMU coverage radius in metres (carried, unused by the core).
    pub edge_devices_range: f64,
    /// GNB coverage radius in metres (informational).
    pub edge_datacenters_coverage: f64,

    /// Cellular / MAN / WAN bandwidth in bits per second.
    pub cellular_bandwidth: f64,
    pub man_bandwidth: f64,
    pub wan_bandwidth: f64,
    /// Cellular / MAN / WAN base latency in seconds.
    pub cellular_latency: f64,
    pub man_latency: f64,
    pub wan_latency: f64,
    /// Cellular / MAN / WAN jitter standard deviation in seconds.
    pub cellular_jitter: f64,
    pub man_jitter: f64,
    pub wan_jitter: f64,

    /// PMU placement seed. Negative selects OS entropy.
    pub pmu_placement_seed: i64,
    /// Network jitter seed. Negative selects OS entropy.
    pub network_jitter_seed: i64,

    /// Distance propagation coefficient in seconds per metre.
    pub propagation_per_meter: f64,
    /// PDC collection window measured from the first arrival of an epoch.
    pub pdc_max_wait: f64,
    /// Grid-analysis compute length in million instructions.
    pub grid_analysis_length_mi: f64,
    /// Grid-analysis output size in KB.
    pub grid_analysis_output_kb: f64,
}

impl SimSettings {
    /// Load settings from a properties file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_properties(&text)
    }

    /// Parse settings from properties text (`key = value` lines, `#`/`;`
    /// comments).
    pub fn from_properties(text: &str) -> Result<Self, SimError> {
        let map = parse_properties(text);

        const KNOWN: &[&str] = &[
            "min_number_of_edge_devices",
            "max_number_of_edge_devices",
            "simulation_time",
            "length",
            "width",
            "edge_devices_range",
            "edge_datacenters_coverage",
            "cellular_bandwidth",
            "man_bandwidth",
            "wan_bandwidth",
            "cellular_latency",
            "man_latency",
            "wan_latency",
            "cellular_jitter_ms",
            "man_jitter_ms",
            "wan_jitter_ms",
            "pmu_placement_seed",
            "network_jitter_seed",
            "propagation_us_per_meter",
            "pdc_max_wait",
            "grid_analysis_length_mi",
            "grid_analysis_output_kb",
        ];
        for key in map.keys() {
            if !KNOWN.contains(&key.as_str()) {
                log::warn!("ignoring unknown settings key '{key}'");
            }
        }

        let min_devices = get_usize(&map, "min_number_of_edge_devices")?;
        let max_devices = get_usize(&map, "max_number_of_edge_devices")?;
        if min_devices != max_devices {
            log::warn!(
                "min_number_of_edge_devices={min_devices} differs from max={max_devices}; using max"
            );
        }

        let settings = Self {
            device_count: max_devices,
            simulation_time: get_f64(&map, "simulation_time")?,
            length: get_f64(&map, "length")?,
            width: get_f64(&map, "width")?,
            edge_devices_range: get_f64_or(&map, "edge_devices_range", 0.0)?,
            edge_datacenters_coverage: get_f64_or(&map, "edge_datacenters_coverage", 0.0)?,
            cellular_bandwidth: get_f64(&map, "cellular_bandwidth")?,
            man_bandwidth: get_f64(&map, "man_bandwidth")?,
            wan_bandwidth: get_f64(&map, "wan_bandwidth")?,
            cellular_latency: get_f64(&map, "cellular_latency")?,
            man_latency: get_f64(&map, "man_latency")?,
            wan_latency: get_f64(&map, "wan_latency")?,
            cellular_jitter: get_f64(&map, "cellular_jitter_ms")? / 1000.0,
            man_jitter: get_f64(&map, "man_jitter_ms")? / 1000.0,
            wan_jitter: get_f64(&map, "wan_jitter_ms")? / 1000.0,
            pmu_placement_seed: get_i64(&map, "pmu_placement_seed")?,
            network_jitter_seed: get_i64_or(&map, "network_jitter_seed", -1)?,
            propagation_per_meter: get_f64_or(&map, "propagation_us_per_meter", 4.0)? * 1e-6,
            pdc_max_wait: get_f64(&map, "pdc_max_wait")?,
            grid_analysis_length_mi: get_f64_or(&map, "grid_analysis_length_mi", 15_000.0)?,
            grid_analysis_output_kb: get_f64_or(&map, "grid_analysis_output_kb", 50.0)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the simulation cannot run with.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.device_count == 0 {
            return Err(SimError::config("at least one PMU device is required"));
        }
        if self.simulation_time <= 0.0 {
            return Err(SimError::config("simulation_time must be positive"));
        }
        if self.length <= 0.0 || self.width <= 0.0 {
            return Err(SimError::config("map length and width must be positive"));
        }
        for (name, bw) in [
            ("cellular_bandwidth", self.cellular_bandwidth),
            ("man_bandwidth", self.man_bandwidth),
            ("wan_bandwidth", self.wan_bandwidth),
        ] {
            if bw <= 0.0 {
                return Err(SimError::Config(format!("{name} must be positive")));
            }
        }
        for (name, v) in [
            ("cellular_latency", self.cellular_latency),
            ("man_latency", self.man_latency),
            ("wan_latency", self.wan_latency),
            ("cellular_jitter_ms", self.cellular_jitter),
            ("man_jitter_ms", self.man_jitter),
            ("wan_jitter_ms", self.wan_jitter),
        ] {
            if v < 0.0 {
                return Err(SimError::Config(format!("{name} must not be negative")));
            }
        }
        if self.pdc_max_wait <= 0.0 {
            return Err(SimError::config("pdc_max_wait must be positive"));
        }
        if self.grid_analysis_length_mi <= 0.0 {
            return Err(SimError::config("grid_analysis_length_mi must be positive"));
        }
        Ok(())
    }
}

fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        } else {
            log::warn!("ignoring malformed settings line '{line}'");
        }
    }
    map
}

fn get_raw<'m>(map: &'m HashMap<String, String>, key: &str) -> Result<&'m str, SimError> {
    map.get(key)
        .map(String::as_str)
        .ok_or_else(|| SimError::Config(format!("missing required key '{key}'")))
}

fn get_f64(map: &HashMap<String, String>, key: &str) -> Result<f64, SimError> {
    let raw = get_raw(map, key)?;
    raw.parse()
        .map_err(|_| SimError::Config(format!("key '{key}': '{raw}' is not a number")))
}

fn get_f64_or(map: &HashMap<String, String>, key: &str, default: f64) -> Result<f64, SimError> {
    match map.get(key) {
        Some(_) => get_f64(map, key),
        None => Ok(default),
    }
}

fn get_i64(map: &HashMap<String, String>, key: &str) -> Result<i64, SimError> {
    let raw = get_raw(map, key)?;
    raw.parse()
        .map_err(|_| SimError::Config(format!("key '{key}': '{raw}' is not an integer")))
}

fn get_i64_or(map: &HashMap<String, String>, key: &str, default: i64) -> Result<i64, SimError> {
    match map.get(key) {
        Some(_) => get_i64(map, key),
        None => Ok(default),
    }
}

fn get_usize(map: &HashMap<String, String>, key: &str) -> Result<usize, SimError> {
    let raw = get_raw(map, key)?;
    raw.parse()
        .map_err(|_| SimError::Config(format!("key '{key}': '{raw}' is not a count")))
}

// ---------------------------------------------------------------------------
// Topology document
// ---------------------------------------------------------------------------

/// A 2-D position in metres, as written in topology files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationSpec {
    pub x: f64,
    pub y: f64,
}

/// One datacenter entry (edge or cloud).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatacenterSpec {
    pub name: String,
    pub location: LocationSpec,
    pub cores: u32,
    /// Per-core capacity in million instructions per second.
    pub mips: f64,
    pub ram_mb: u64,
    pub storage_mb: u64,
}

/// The topology document: edge datacenters (GNBs plus the TELCO hub) and
/// cloud datacenters (the TSO).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    pub edge_datacenters: Vec<DatacenterSpec>,
    pub cloud_datacenters: Vec<DatacenterSpec>,
}

impl TopologyConfig {
    /// Load a topology document from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse a topology document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, SimError> {
        serde_json::from_str(text).map_err(|e| SimError::Config(format!("topology: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Application document
// ---------------------------------------------------------------------------

/// One application profile entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSpec {
    pub name: String,
    /// Samples per second per PMU.
    pub rate: u32,
    /// Max-latency hint in seconds, carried on every sample.
    pub latency: f64,
    /// Container size in KB for grid-analysis descriptors.
    pub container_size_kb: f64,
}

/// The application document. Exactly one `PMU_Data` application is expected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub applications: Vec<AppSpec>,
}

impl ApplicationConfig {
    /// Load an application document from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse an application document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, SimError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| SimError::Config(format!("application: {e}")))?;
        config.pmu_data()?;
        Ok(config)
    }

    /// The `PMU_Data` profile.
    pub fn pmu_data(&self) -> Result<&AppSpec, SimError> {
        let mut matches = self.applications.iter().filter(|a| a.name == "PMU_Data");
        let app = matches
            .next()
            .ok_or_else(|| SimError::config("application 'PMU_Data' not found"))?;
        if matches.next().is_some() {
            return Err(SimError::config("duplicate 'PMU_Data' application"));
        }
        if app.rate == 0 {
            return Err(SimError::config("PMU_Data rate must be positive"));
        }
        Ok(app)
    }
}

// ---------------------------------------------------------------------------
// Derived analysis parameters
// ---------------------------------------------------------------------------

/// Fixed parameters stamped on every grid-analysis descriptor.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AnalysisParams {
    /// Compute length in million instructions.
    pub length_mi: f64,
    /// Output size in KB.
    pub output_kb: f64,
    /// Container size in KB.
    pub container_kb: f64,
    /// Max-latency hint in seconds.
    pub max_latency: f64,
}

impl AnalysisParams {
    /// Combine settings-level constants with the application profile.
    pub fn derive(settings: &SimSettings, app: &AppSpec) -> Self {
        Self {
            length_mi: settings.grid_analysis_length_mi,
            output_kb: settings.grid_analysis_output_kb,
            container_kb: app.container_size_kb,
            max_latency: app.latency,
        }
    }
}
