//! # gridsim-core
//!
//! **A discrete-event simulator for smart-grid telemetry.**
//!
//! `gridsim-core` emulates a fleet of Phasor Measurement Units (PMUs) that
//! emit synchronized measurement samples, transports them through a layered
//! cellular/metropolitan/wide-area topology, and collects them at Phasor Data
//! Concentrators (PDCs) that assemble per-epoch batches under a deadline and
//! trigger grid-analysis work.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gridsim_core::{ApplicationConfig, Scenario, ScenarioKind, SimSettings, TopologyConfig};
//!
//! let settings = SimSettings::load("simulation.properties").unwrap();
//! let topology = TopologyConfig::load("topology.json").unwrap();
//! let application = ApplicationConfig::load("application.json").unwrap();
//!
//! let mut scenario = Scenario::build(ScenarioKind::V3, &settings, &topology, &application).unwrap();
//! let report = scenario.run().unwrap();
//! println!("{} epochs collected", report.total_buckets());
//! ```
//!
//! ## Architecture
//!
//! Generator → Scheduler → Network Model → PDC Collector → Orchestrator → Sink
//!
//! The scheduler is a single-threaded cooperative event loop: a binary heap of
//! `(due_time, seq)` entries dispatches exactly one event at a time, entity
//! handlers run to completion and interact only by scheduling future events.
//! Given fixed placement and jitter seeds, a run replays bit-for-bit.
//!
//! Three placement variants are modeled:
//!
//! - **V1**: UPF at the TELCO hub, PDC at the TSO cloud (PMU→GNB→TELCO→TSO)
//! - **V2**: UPF at the TELCO hub, PDC at each GNB (PMU→GNB→TELCO→GNB)
//! - **V3**: UPF at the GNB, PDC at each GNB (PMU→GNB)

pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod network;
pub mod orchestrator;
pub mod scenario;
pub mod sink;
pub mod task;
pub mod topology;

pub use collector::{PdcCollector, PdcStats};
pub use config::{AnalysisParams, ApplicationConfig, SimSettings, TopologyConfig};
pub use engine::{Engine, Entity, EntityId, Kernel, Signal, SimTime};
pub use error::SimError;
pub use network::{Layer, LinkClass, NetworkModel};
pub use orchestrator::Orchestrator;
pub use scenario::{RunReport, Scenario, ScenarioKind};
pub use sink::{RunSink, SinkHandle};
pub use task::{BatchType, EpochKey, GridAnalysis, Sample, Task, epoch_key};
pub use topology::{Node, NodeId, NodeKind, Point, Topology};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
