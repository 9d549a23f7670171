//! Scenario wiring: placement variants, entity construction, run driver.
//!
//! Variants are assembled by explicit composition: the same engine, network
//! model, orchestrator, and collector types are wired differently per
//! variant. V1 binds every PMU to a single TSO collector; V2 and V3 create
//! one collector per GNB and bind each PMU to the collector of its closest
//! GNB. The network model gets the matching hop list through its own variant
//! switch.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::str::FromStr;

use serde::Serialize;

use crate::collector::{PdcCollector, PdcConfig, PdcStats};
use crate::config::{AnalysisParams, ApplicationConfig, SimSettings, TopologyConfig};
use crate::engine::Engine;
use crate::error::SimError;
use crate::generator;
use crate::network::NetworkModel;
use crate::orchestrator::{OrchStats, Orchestrator};
use crate::sink::{RunSink, SinkHandle};
use crate::task::{AnalysisIds, SampleIds};
use crate::topology::Topology;

/// UPF/PDC placement variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScenarioKind {
    /// UPF at TELCO, PDC at the TSO cloud: PMU→GNB→TELCO→TSO.
    V1,
    /// UPF at TELCO, PDC at each GNB: PMU→GNB→TELCO→GNB.
    V2,
    /// UPF at the GNB, PDC at each GNB: PMU→GNB.
    V3,
}

impl ScenarioKind {
    /// Lowercase label used for output directories and CSV naming.
    pub fn label(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
            Self::V3 => "v3",
        }
    }

    /// Whether PDCs sit at the GNBs (V2/V3) rather than the TSO cloud.
    pub fn per_gnb_pdc(&self) -> bool {
        matches!(self, Self::V2 | Self::V3)
    }
}

impl std::fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => write!(f, "V1"),
            Self::V2 => write!(f, "V2"),
            Self::V3 => write!(f, "V3"),
        }
    }
}

impl FromStr for ScenarioKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v1" => Ok(Self::V1),
            "v2" => Ok(Self::V2),
            "v3" => Ok(Self::V3),
            other => Err(format!("unknown scenario '{other}' (expected v1, v2, or v3)")),
        }
    }
}

/// Per-collector slice of the run report.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorReport {
    pub node: String,
    pub required: usize,
    pub stats: PdcStats,
}

/// Everything a finished run exposes besides the CSV sinks.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario: ScenarioKind,
    pub version: String,
    pub pmu_count: usize,
    pub duration: f64,
    pub rate: u32,
    pub placement_seed: u64,
    pub jitter_seed: u64,
    pub generated_samples: u64,
    pub dispatched_events: u64,
    pub collectors: Vec<CollectorReport>,
    pub orchestrator: OrchStats,
    pub pmu_rows: usize,
    pub analysis_rows: usize,
    pub lost_rows: u64,
}

impl RunReport {
    pub fn total_buckets(&self) -> u64 {
        self.collectors.iter().map(|c| c.stats.total_buckets).sum()
    }

    pub fn complete_buckets(&self) -> u64 {
        self.collectors.iter().map(|c| c.stats.complete_buckets).sum()
    }

    pub fn timeout_buckets(&self) -> u64 {
        self.collectors.iter().map(|c| c.stats.timeout_buckets).sum()
    }

    pub fn dropped_late(&self) -> u64 {
        self.collectors.iter().map(|c| c.stats.dropped_late).sum()
    }
}

/// A fully wired scenario, ready to run.
pub struct Scenario {
    kind: ScenarioKind,
    engine: Engine,
    topology: Rc<Topology>,
    sink: SinkHandle,
    collectors: Vec<(String, usize, Rc<RefCell<PdcStats>>)>,
    orch_stats: Rc<RefCell<OrchStats>>,
    jitter_seed: u64,
    generated: u64,
    pmu_count: usize,
    duration: f64,
    rate: u32,
}

impl Scenario {
    /// Build the topology and wire every entity for the given variant.
    pub fn build(
        kind: ScenarioKind,
        settings: &SimSettings,
        topology_config: &TopologyConfig,
        application: &ApplicationConfig,
    ) -> Result<Self, SimError> {
        let topology = Rc::new(Topology::build(settings, topology_config)?);
        Self::build_with_topology(kind, settings, topology, application)
    }

    /// Wire a variant over an already-built topology (fixed PMU positions).
    pub fn build_with_topology(
        kind: ScenarioKind,
        settings: &SimSettings,
        topology: Rc<Topology>,
        application: &ApplicationConfig,
    ) -> Result<Self, SimError> {
        let app = application.pmu_data()?;
        let sink: SinkHandle = Rc::new(RefCell::new(RunSink::new(kind.label(), kind.per_gnb_pdc())));
        let params = AnalysisParams::derive(settings, app);
        let analysis_ids = AnalysisIds::new();

        let mut engine = Engine::new();
        let orch_stats = Rc::new(RefCell::new(OrchStats::default()));
        let orchestrator = engine.register(Box::new(Orchestrator::new(
            topology.clone(),
            sink.clone(),
            orch_stats.clone(),
        )));

        let mut collectors = Vec::new();
        let mut collector_of = HashMap::new();

        if kind.per_gnb_pdc() {
            for &gnb in topology.gnbs() {
                let owned: Vec<_> = topology
                    .pmus()
                    .iter()
                    .copied()
                    .filter(|&p| topology.closest_gnb(p) == Some(gnb))
                    .collect();
                let stats = Rc::new(RefCell::new(PdcStats::default()));
                let id = engine.register(Box::new(PdcCollector::new(
                    PdcConfig {
                        assigned_node: gnb,
                        required: owned.len(),
                        max_wait: settings.pdc_max_wait,
                        filter_foreign: true,
                    },
                    topology.clone(),
                    orchestrator,
                    sink.clone(),
                    analysis_ids.clone(),
                    params,
                    stats.clone(),
                )));
                collectors.push((topology.node(gnb).name.clone(), owned.len(), stats));
                for pmu in owned {
                    collector_of.insert(pmu, id);
                }
            }
        } else {
            let tso = topology.tso();
            let stats = Rc::new(RefCell::new(PdcStats::default()));
            let required = topology.pmus().len();
            let id = engine.register(Box::new(PdcCollector::new(
                PdcConfig {
                    assigned_node: tso,
                    required,
                    max_wait: settings.pdc_max_wait,
                    filter_foreign: false,
                },
                topology.clone(),
                orchestrator,
                sink.clone(),
                analysis_ids,
                params,
                stats.clone(),
            )));
            collectors.push((topology.node(tso).name.clone(), required, stats));
            for &pmu in topology.pmus() {
                collector_of.insert(pmu, id);
            }
        }

        let model = NetworkModel::new(kind, topology.clone(), settings, collector_of, sink.clone())?;
        let jitter_seed = model.jitter_seed();
        let network = engine.register(Box::new(model));

        let mut ids = SampleIds::default();
        let generated = generator::populate(
            engine.kernel_mut(),
            &topology,
            settings,
            app.rate,
            app.latency,
            &mut ids,
            network,
        );

        Ok(Self {
            kind,
            engine,
            topology,
            sink,
            collectors,
            orch_stats,
            jitter_seed,
            generated,
            pmu_count: settings.device_count,
            duration: settings.simulation_time,
            rate: app.rate,
        })
    }

    pub fn kind(&self) -> ScenarioKind {
        self.kind
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn sink(&self) -> SinkHandle {
        self.sink.clone()
    }

    /// Number of samples waiting in the scheduler before the loop starts.
    pub fn pending_events(&self) -> usize {
        self.engine.kernel().pending()
    }

    /// Drain the event queue and assemble the run report.
    ///
    /// On a scheduler fault the error propagates; the sink handle stays
    /// valid so the caller can still flush partial output.
    pub fn run(&mut self) -> Result<RunReport, SimError> {
        let dispatched = self.engine.run(None)?;
        Ok(self.report(dispatched))
    }

    fn report(&self, dispatched: u64) -> RunReport {
        let sink = self.sink.borrow();
        RunReport {
            scenario: self.kind,
            version: crate::VERSION.to_string(),
            pmu_count: self.pmu_count,
            duration: self.duration,
            rate: self.rate,
            placement_seed: self.topology.placement_seed(),
            jitter_seed: self.jitter_seed,
            generated_samples: self.generated,
            dispatched_events: dispatched,
            collectors: self
                .collectors
                .iter()
                .map(|(node, required, stats)| CollectorReport {
                    node: node.clone(),
                    required: *required,
                    stats: stats.borrow().clone(),
                })
                .collect(),
            orchestrator: self.orch_stats.borrow().clone(),
            pmu_rows: sink.pmu_row_count(),
            analysis_rows: sink.analysis_row_count(),
            lost_rows: sink.lost_rows(),
        }
    }
}
