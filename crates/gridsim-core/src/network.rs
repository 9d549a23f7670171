//! Layered network model: per-hop transfer delays and routing to PDCs.
//!
//! A hop's delay is `max(0, bits/bandwidth + base_latency + jitter +
//! distance·k)` with `jitter ~ Normal(0, σ_class)`. All jitter is drawn from
//! one seeded generator owned by the model, never shared with the placement
//! RNG, so transfer order is reproducible per seed. Every hop is charged to
//! its network layer for load accounting regardless of how the sample is
//! later classified.

use std::collections::HashMap;
use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;

use crate::config::SimSettings;
use crate::engine::{Entity, EntityId, Kernel, Signal};
use crate::error::SimError;
use crate::scenario::ScenarioKind;
use crate::sink::SinkHandle;
use crate::task::Sample;
use crate::topology::{NodeId, Topology};

/// Link class of one hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkClass {
    Cellular,
    Man,
    Wan,
}

impl std::fmt::Display for LinkClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cellular => write!(f, "cellular"),
            Self::Man => write!(f, "man"),
            Self::Wan => write!(f, "wan"),
        }
    }
}

/// Network layer a hop's bytes are charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Layer {
    PmuToGnb,
    GnbToTelco,
    TelcoToGnb,
    TelcoToTso,
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PmuToGnb => write!(f, "PMU->GNB"),
            Self::GnbToTelco => write!(f, "GNB->TELCO"),
            Self::TelcoToGnb => write!(f, "TELCO->GNB"),
            Self::TelcoToTso => write!(f, "TELCO->TSO"),
        }
    }
}

/// Bandwidth and base latency for one link class.
#[derive(Debug, Clone, Copy)]
struct LinkParams {
    bandwidth: f64,
    latency: f64,
}

#[derive(Debug, Clone, Copy)]
struct Hop {
    src: NodeId,
    dst: NodeId,
    class: LinkClass,
    layer: Layer,
}

/// The network model entity: delays transfers and routes them to PDCs.
pub struct NetworkModel {
    variant: ScenarioKind,
    topology: Rc<Topology>,
    cellular: LinkParams,
    man: LinkParams,
    wan: LinkParams,
    jitter_cellular: Normal<f64>,
    jitter_man: Normal<f64>,
    jitter_wan: Normal<f64>,
    /// Seconds per metre of distance propagation.
    propagation_per_meter: f64,
    rng: StdRng,
    jitter_seed: u64,
    /// Memoized PMU → collector entity routing, from scenario wiring.
    collector_of: HashMap<NodeId, EntityId>,
    sink: SinkHandle,
}

impl NetworkModel {
    pub fn new(
        variant: ScenarioKind,
        topology: Rc<Topology>,
        settings: &SimSettings,
        collector_of: HashMap<NodeId, EntityId>,
        sink: SinkHandle,
    ) -> Result<Self, SimError> {
        let jitter_seed = if settings.network_jitter_seed < 0 {
            use rand::Rng;
            let seed: u64 = rand::rng().random();
            log::info!("negative jitter seed configured, drew {seed} from OS entropy");
            seed
        } else {
            settings.network_jitter_seed as u64
        };

        let normal = |sigma: f64| {
            Normal::new(0.0, sigma)
                .map_err(|e| SimError::Config(format!("invalid jitter sigma {sigma}: {e}")))
        };

        Ok(Self {
            variant,
            topology,
            cellular: LinkParams {
                bandwidth: settings.cellular_bandwidth,
                latency: settings.cellular_latency,
            },
            man: LinkParams {
                bandwidth: settings.man_bandwidth,
                latency: settings.man_latency,
            },
            wan: LinkParams {
                bandwidth: settings.wan_bandwidth,
                latency: settings.wan_latency,
            },
            jitter_cellular: normal(settings.cellular_jitter)?,
            jitter_man: normal(settings.man_jitter)?,
            jitter_wan: normal(settings.wan_jitter)?,
            propagation_per_meter: settings.propagation_per_meter,
            rng: StdRng::seed_from_u64(jitter_seed),
            jitter_seed,
            collector_of,
            sink,
        })
    }

    pub fn jitter_seed(&self) -> u64 {
        self.jitter_seed
    }

    /// The variant's hop list for a sample leaving `pmu`.
    fn hops(&self, pmu: NodeId) -> Result<Vec<Hop>, String> {
        let gnb = self
            .topology
            .closest_gnb(pmu)
            .ok_or_else(|| format!("node {pmu} has no GNB assignment"))?;
        let telco = self.topology.telco();
        let tso = self.topology.tso();

        let cellular = Hop {
            src: pmu,
            dst: gnb,
            class: LinkClass::Cellular,
            layer: Layer::PmuToGnb,
        };
        let uplink_man = Hop {
            src: gnb,
            dst: telco,
            class: LinkClass::Man,
            layer: Layer::GnbToTelco,
        };

        Ok(match self.variant {
            ScenarioKind::V1 => vec![
                cellular,
                uplink_man,
                Hop {
                    src: telco,
                    dst: tso,
                    class: LinkClass::Wan,
                    layer: Layer::TelcoToTso,
                },
            ],
            ScenarioKind::V2 => vec![
                cellular,
                uplink_man,
                Hop {
                    src: telco,
                    dst: gnb,
                    class: LinkClass::Man,
                    layer: Layer::TelcoToGnb,
                },
            ],
            ScenarioKind::V3 => vec![cellular],
        })
    }

    /// One hop's transfer delay. Draws jitter from the model's RNG.
    fn hop_delay(&mut self, hop: &Hop, bits: u64) -> f64 {
        let (params, jitter) = match hop.class {
            LinkClass::Cellular => (self.cellular, self.jitter_cellular),
            LinkClass::Man => (self.man, self.jitter_man),
            LinkClass::Wan => (self.wan, self.jitter_wan),
        };
        let distance = self.topology.distance(hop.src, hop.dst);
        let delay = bits as f64 / params.bandwidth
            + params.latency
            + jitter.sample(&mut self.rng)
            + distance * self.propagation_per_meter;
        delay.max(0.0)
    }

    /// Delay a sample along the variant's path and schedule its delivery.
    fn start_transfer(
        &mut self,
        kernel: &mut Kernel,
        self_id: EntityId,
        mut sample: Sample,
    ) -> Result<(), String> {
        let hops = self.hops(sample.source)?;

        let mut total = 0.0;
        let mut path = self.topology.node(sample.source).name.clone();
        for (i, hop) in hops.iter().enumerate() {
            let delay = self.hop_delay(hop, sample.size_bits);
            let distance = self.topology.distance(hop.src, hop.dst);
            sample.record_hop(i as u32, delay);
            path.push_str(&format!(
                " -> {} [{} {distance:.1}m {delay:.6}s]",
                self.topology.node(hop.dst).name,
                hop.class
            ));
            total += delay;

            self.sink
                .borrow_mut()
                .add_transfer(hop.layer, sample.size_kb());
        }
        sample.path = path;

        kernel.schedule(total, self_id, Signal::TransferFinished(sample));
        Ok(())
    }

    /// Route a delivered sample to the PDC collector owning its PMU.
    fn finish_transfer(&mut self, kernel: &mut Kernel, sample: Sample) -> Result<(), String> {
        let collector = self
            .collector_of
            .get(&sample.source)
            .copied()
            .ok_or_else(|| format!("no collector bound for PMU {}", sample.source))?;
        kernel.schedule_now(collector, Signal::DataReceived(sample));
        Ok(())
    }
}

impl Entity for NetworkModel {
    fn name(&self) -> &str {
        "network"
    }

    fn on_signal(
        &mut self,
        kernel: &mut Kernel,
        self_id: EntityId,
        signal: Signal,
    ) -> Result<(), String> {
        match signal {
            Signal::TransferStart(sample) => self.start_transfer(kernel, self_id, sample),
            Signal::TransferFinished(sample) => self.finish_transfer(kernel, sample),
            other => {
                log::debug!("network: ignoring {}", other.tag());
                Ok(())
            }
        }
    }
}
