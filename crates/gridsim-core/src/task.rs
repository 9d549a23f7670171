//! Measurement samples and grid-analysis descriptors.
//!
//! The two task families are a true sum type ([`Task`]); the historical
//! id split (analysis ids start at [`ANALYSIS_ID_BASE`]) is kept so CSV
//! consumers can still tell the families apart by id range alone.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;

use crate::topology::NodeId;

/// Fixed PMU sample payload: 2 KB.
pub const PMU_SAMPLE_BITS: u64 = 16_384;

/// First id handed out to grid-analysis descriptors.
pub const ANALYSIS_ID_BASE: u64 = 10_000;

/// Epoch key: a generation time bucketed to integer milliseconds.
pub type EpochKey = i64;

/// Bucket a generation time (seconds) into its epoch key.
pub fn epoch_key(generation_time: f64) -> EpochKey {
    (generation_time * 1000.0).round() as EpochKey
}

/// The generation time (seconds) an epoch key stands for.
pub fn epoch_time(key: EpochKey) -> f64 {
    key as f64 / 1000.0
}

/// On-time/late classification of a delivered sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrivalClass {
    OnTime,
    Late,
}

impl std::fmt::Display for ArrivalClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnTime => write!(f, "OK"),
            Self::Late => write!(f, "DEADLINE_MISSED"),
        }
    }
}

/// One synchronized PMU measurement travelling through the network.
///
/// Created by the generator, mutated only by the network model (per-hop
/// delays, path) and the collector (classification).
#[derive(Debug, Clone)]
pub struct Sample {
    /// Monotonically assigned id, below [`ANALYSIS_ID_BASE`].
    pub id: u64,
    /// Epoch generation time in seconds, identical across the fleet.
    pub generation_time: f64,
    /// Source PMU.
    pub source: NodeId,
    /// Payload size in bits.
    pub size_bits: u64,
    /// Application index (the `PMU_Data` profile).
    pub app_id: u32,
    /// Max-latency hint from the application profile.
    pub max_latency: f64,
    /// Per-hop recorded delays, hop index → seconds.
    pub hop_delays: BTreeMap<u32, f64>,
    /// Accumulated network time in seconds.
    pub network_delay: f64,
    /// Textual hop list with per-hop seconds and distances.
    pub path: String,
    /// Set by the collector when the epoch drains.
    pub classification: Option<ArrivalClass>,
}

impl Sample {
    pub fn new(id: u64, generation_time: f64, source: NodeId, max_latency: f64) -> Self {
        Self {
            id,
            generation_time,
            source,
            size_bits: PMU_SAMPLE_BITS,
            app_id: 0,
            max_latency,
            hop_delays: BTreeMap::new(),
            network_delay: 0.0,
            path: String::new(),
            classification: None,
        }
    }

    /// Record one hop's delay and fold it into the accumulated network time.
    pub fn record_hop(&mut self, hop_index: u32, delay: f64) {
        self.hop_delays.insert(hop_index, delay);
        self.network_delay += delay;
    }

    /// Sum of recorded per-hop delays. Equals `network_delay` up to
    /// floating-point epsilon.
    pub fn hop_sum(&self) -> f64 {
        self.hop_delays.values().sum()
    }

    /// Payload size in KB.
    pub fn size_kb(&self) -> f64 {
        self.size_bits as f64 / 8.0 / 1024.0
    }
}

/// Whether a batch closed because everyone arrived or because the window
/// elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchType {
    Complete,
    Timeout,
}

impl std::fmt::Display for BatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => write!(f, "COMPLETE"),
            Self::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// A grid-analysis compute descriptor, emitted when an epoch bucket drains.
#[derive(Debug, Clone)]
pub struct GridAnalysis {
    /// Id at or above [`ANALYSIS_ID_BASE`].
    pub id: u64,
    pub epoch: EpochKey,
    /// Ids of the on-time samples absorbed into this batch.
    pub absorbed: Vec<u64>,
    /// On-time arrival count.
    pub on_time: usize,
    /// Expected arrival count for the owning collector.
    pub required: usize,
    /// Total input size: `on_time × sample bits`.
    pub input_bits: u64,
    pub output_kb: f64,
    /// Compute length in million instructions.
    pub length_mi: f64,
    pub container_kb: f64,
    pub max_latency: f64,
    pub batch: BatchType,
    /// The PDC host this analysis runs on.
    pub bound_node: NodeId,
    /// First-to-last spread of on-time arrivals, or the full window on
    /// timeout.
    pub pdc_waiting_time: f64,
    /// Network delay of the earliest on-time arrival.
    pub first_data_network_delay: f64,
    /// Set by the orchestrator when the compute finishes.
    pub exec_time: Option<f64>,
}

impl GridAnalysis {
    pub fn input_kb(&self) -> f64 {
        self.input_bits as f64 / 8.0 / 1024.0
    }

    /// Coverage as `on_time/required`.
    pub fn coverage(&self) -> String {
        format!("{}/{}", self.on_time, self.required)
    }
}

/// The two task families routed through the orchestrator.
#[derive(Debug, Clone)]
pub enum Task {
    PmuData(Sample),
    GridAnalysis(GridAnalysis),
}

/// Monotonic sample id allocator shared by the generator.
#[derive(Debug, Default)]
pub struct SampleIds {
    next: u64,
}

impl SampleIds {
    pub fn next(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn allocated(&self) -> u64 {
        self.next
    }
}

/// Monotonic analysis id allocator, shared by every collector in a scenario
/// so descriptor ids never collide across PDC instances.
#[derive(Debug, Clone)]
pub struct AnalysisIds(Rc<Cell<u64>>);

impl AnalysisIds {
    pub fn new() -> Self {
        Self(Rc::new(Cell::new(ANALYSIS_ID_BASE)))
    }

    pub fn next(&self) -> u64 {
        let id = self.0.get();
        self.0.set(id + 1);
        id
    }
}

impl Default for AnalysisIds {
    fn default() -> Self {
        Self::new()
    }
}
