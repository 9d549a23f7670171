//! Nodes and topology: PMU fleet placement and closest-GNB routing.
//!
//! Nodes are immutable after construction and owned by the [`Topology`] for
//! the simulation lifetime. PMUs are placed on a shuffled uniform grid so a
//! fleet spreads over the whole map while every coordinate stays a
//! deterministic function of the placement seed. Each PMU's closest GNB is
//! computed once at build time and memoized.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::{DatacenterSpec, SimSettings, TELCO_NAME, TSO_NAME, TopologyConfig};
use crate::error::SimError;

/// Stable node identifier (index into the topology's node table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    /// Phasor Measurement Unit (leaf sensor).
    Pmu,
    /// Radio-access edge datacenter terminating cellular uplink.
    Gnb,
    /// Metropolitan hub.
    Telco,
    /// Transmission-system-operator cloud.
    Tso,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pmu => write!(f, "PMU"),
            Self::Gnb => write!(f, "GNB"),
            Self::Telco => write!(f, "TELCO"),
            Self::Tso => write!(f, "TSO"),
        }
    }
}

/// A 2-D location in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Compute capacity of a datacenter node.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Capacity {
    pub cores: u32,
    /// Million instructions per second per core.
    pub mips_per_core: f64,
    pub ram_mb: u64,
    pub storage_mb: u64,
}

/// A simulation node. Immutable after construction.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub location: Point,
    /// Present for datacenters, absent for PMUs.
    pub capacity: Option<Capacity>,
}

/// The full node set for one scenario, with memoized PMU→GNB assignment.
#[derive(Debug)]
pub struct Topology {
    nodes: Vec<Node>,
    pmus: Vec<NodeId>,
    gnbs: Vec<NodeId>,
    telco: NodeId,
    tso: NodeId,
    closest: HashMap<NodeId, NodeId>,
    /// The placement seed actually used (resolved from OS entropy when the
    /// configured seed was negative).
    placement_seed: u64,
}

impl Topology {
    /// Build the topology: datacenters from configuration, PMUs placed on the
    /// shuffled uniform grid, closest-GNB assignment memoized.
    pub fn build(settings: &SimSettings, config: &TopologyConfig) -> Result<Self, SimError> {
        let seed = resolve_seed(settings.pmu_placement_seed);
        let positions = place_pmus(settings.device_count, settings.width, settings.length, seed);
        Self::assemble(config, &positions, seed)
    }

    /// Build the topology with explicit PMU positions instead of grid
    /// placement. This is the static-mobility seam: each PMU reports the
    /// fixed position given here for the whole run.
    pub fn with_pmu_locations(
        settings: &SimSettings,
        config: &TopologyConfig,
        positions: &[Point],
    ) -> Result<Self, SimError> {
        if positions.len() != settings.device_count {
            return Err(SimError::topology(format!(
                "{} PMU positions given for a fleet of {}",
                positions.len(),
                settings.device_count
            )));
        }
        let seed = resolve_seed(settings.pmu_placement_seed);
        Self::assemble(config, positions, seed)
    }

    fn assemble(
        config: &TopologyConfig,
        positions: &[Point],
        placement_seed: u64,
    ) -> Result<Self, SimError> {
        let mut nodes = Vec::new();
        let mut gnbs = Vec::new();
        let mut telco = None;

        for spec in &config.edge_datacenters {
            let id = NodeId(nodes.len());
            let kind = if spec.name == TELCO_NAME {
                if telco.is_some() {
                    return Err(SimError::topology("more than one TELCO edge datacenter"));
                }
                telco = Some(id);
                NodeKind::Telco
            } else {
                gnbs.push(id);
                NodeKind::Gnb
            };
            nodes.push(datacenter_node(id, kind, spec));
        }

        let telco = telco.ok_or_else(|| SimError::topology("no TELCO edge datacenter found"))?;
        if gnbs.is_empty() {
            return Err(SimError::topology("no GNB edge datacenters found"));
        }

        let mut tso = None;
        for spec in &config.cloud_datacenters {
            if spec.name == TSO_NAME {
                if tso.is_some() {
                    return Err(SimError::topology("more than one TSO cloud datacenter"));
                }
                let id = NodeId(nodes.len());
                tso = Some(id);
                nodes.push(datacenter_node(id, NodeKind::Tso, spec));
            } else {
                log::warn!("ignoring cloud datacenter '{}' (only TSO is used)", spec.name);
            }
        }
        let tso = tso.ok_or_else(|| SimError::topology("no TSO cloud datacenter found"))?;

        let mut pmus = Vec::with_capacity(positions.len());
        for (i, &location) in positions.iter().enumerate() {
            let id = NodeId(nodes.len());
            pmus.push(id);
            nodes.push(Node {
                id,
                name: format!("PMU_{i}"),
                kind: NodeKind::Pmu,
                location,
                capacity: None,
            });
        }

        let mut closest = HashMap::with_capacity(pmus.len());
        for &pmu in &pmus {
            let gnb = closest_by_distance(&nodes, &gnbs, &nodes[pmu.0].location)
                .ok_or_else(|| SimError::topology(format!("PMU {pmu} has no assignable GNB")))?;
            closest.insert(pmu, gnb);
        }

        Ok(Self {
            nodes,
            pmus,
            gnbs,
            telco,
            tso,
            closest,
            placement_seed,
        })
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn pmus(&self) -> &[NodeId] {
        &self.pmus
    }

    pub fn gnbs(&self) -> &[NodeId] {
        &self.gnbs
    }

    pub fn telco(&self) -> NodeId {
        self.telco
    }

    pub fn tso(&self) -> NodeId {
        self.tso
    }

    /// The memoized closest GNB for a PMU. `None` for non-PMU ids.
    pub fn closest_gnb(&self, pmu: NodeId) -> Option<NodeId> {
        self.closest.get(&pmu).copied()
    }

    /// Distance between two nodes in metres.
    pub fn distance(&self, a: NodeId, b: NodeId) -> f64 {
        self.nodes[a.0].location.distance(&self.nodes[b.0].location)
    }

    pub fn placement_seed(&self) -> u64 {
        self.placement_seed
    }
}

fn datacenter_node(id: NodeId, kind: NodeKind, spec: &DatacenterSpec) -> Node {
    Node {
        id,
        name: spec.name.clone(),
        kind,
        location: Point::new(spec.location.x, spec.location.y),
        capacity: Some(Capacity {
            cores: spec.cores,
            mips_per_core: spec.mips,
            ram_mb: spec.ram_mb,
            storage_mb: spec.storage_mb,
        }),
    }
}

/// Resolve a configured seed: negative selects OS entropy.
fn resolve_seed(configured: i64) -> u64 {
    if configured < 0 {
        let seed: u64 = rand::rng().random();
        log::info!("negative seed configured, drew {seed} from OS entropy");
        seed
    } else {
        configured as u64
    }
}

/// Place `n` PMUs on a shuffled uniform grid over a `width × length` map.
///
/// The map is partitioned into `ceil(sqrt(n·width/length))` columns and
/// `ceil(n/cols)` rows. Cell order is shuffled with `seed·1000 + 999`; PMU
/// `i` lands uniformly inside the i-th shuffled cell under its own seed
/// `seed·10⁶ + i`, so adding a PMU never moves the existing fleet.
fn place_pmus(n: usize, width: f64, length: f64, seed: u64) -> Vec<Point> {
    let cols = ((n as f64 * width / length).sqrt().ceil() as usize).max(1);
    let rows = n.div_ceil(cols).max(1);
    let cell_w = width / cols as f64;
    let cell_h = length / rows as f64;

    let mut cells: Vec<(usize, usize)> = (0..rows)
        .flat_map(|row| (0..cols).map(move |col| (col, row)))
        .collect();
    let mut shuffle_rng = StdRng::seed_from_u64(seed.wrapping_mul(1000).wrapping_add(999));
    cells.shuffle(&mut shuffle_rng);

    (0..n)
        .map(|i| {
            let (col, row) = cells[i % cells.len()];
            let mut rng = StdRng::seed_from_u64(seed.wrapping_mul(1_000_000).wrapping_add(i as u64));
            Point::new(
                col as f64 * cell_w + rng.random_range(0.0..cell_w),
                row as f64 * cell_h + rng.random_range(0.0..cell_h),
            )
        })
        .collect()
}

/// Closest node out of `candidates` by Euclidean distance, ties broken by
/// lowest node id.
fn closest_by_distance(nodes: &[Node], candidates: &[NodeId], from: &Point) -> Option<NodeId> {
    let mut best: Option<(f64, NodeId)> = None;
    for &id in candidates {
        let d = nodes[id.0].location.distance(from);
        let better = match best {
            None => true,
            Some((bd, bid)) => d < bd || (d == bd && id < bid),
        };
        if better {
            best = Some((d, id));
        }
    }
    best.map(|(_, id)| id)
}
