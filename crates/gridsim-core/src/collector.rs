//! PDC collector: per-epoch arrival buckets with a first-arrival deadline.
//!
//! One collector exists per PDC placement (V1: a single TSO collector,
//! V2/V3: one per GNB). Arrivals are bucketed by epoch key; the arrival that
//! creates a bucket starts its waiting timer, and the deadline
//! `first_arrival + max_wait` is fixed at that moment and never moves. When
//! the timer fires the bucket drains exactly once: every buffered sample is
//! classified against the deadline and recorded, and a grid-analysis
//! descriptor is emitted for the on-time set. Samples arriving for an epoch
//! that has already drained can never join the closed bucket; they are
//! recorded as `DEADLINE_MISSED` and dropped.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use serde::Serialize;

use crate::config::AnalysisParams;
use crate::engine::{Entity, EntityId, Kernel, Signal};
use crate::sink::SinkHandle;
use crate::task::{
    AnalysisIds, ArrivalClass, BatchType, EpochKey, GridAnalysis, Sample, Task, epoch_key,
};
use crate::topology::{NodeId, Topology};

/// Per-collector statistics, exposed through the run report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PdcStats {
    pub total_buckets: u64,
    pub complete_buckets: u64,
    pub timeout_buckets: u64,
    /// Samples recorded late: beyond the deadline in a draining bucket, or
    /// arriving after their epoch drained.
    pub dropped_late: u64,
    /// Samples rejected by the ingress filter (wrong collector).
    pub rejected_foreign: u64,
}

/// Static collector parameters from scenario wiring.
#[derive(Debug, Clone, Copy)]
pub struct PdcConfig {
    /// The PDC host (TSO or a specific GNB).
    pub assigned_node: NodeId,
    /// Expected arrivals per epoch.
    pub required: usize,
    /// Waiting window measured from the first arrival of an epoch.
    pub max_wait: f64,
    /// V2/V3: reject samples whose closest GNB is not the assigned node.
    pub filter_foreign: bool,
}

struct Arrival {
    sample: Sample,
    real_arrival: f64,
    network_delay: f64,
}

struct EpochBucket {
    arrivals: Vec<Arrival>,
    first_arrival: f64,
    /// `first_arrival + max_wait`, fixed when the bucket is created.
    deadline: f64,
}

/// A PDC collector entity.
pub struct PdcCollector {
    label: String,
    config: PdcConfig,
    topology: Rc<Topology>,
    orchestrator: EntityId,
    sink: SinkHandle,
    analysis_ids: AnalysisIds,
    params: AnalysisParams,
    buckets: HashMap<EpochKey, EpochBucket>,
    drained: HashSet<EpochKey>,
    stats: Rc<RefCell<PdcStats>>,
}

impl PdcCollector {
    pub fn new(
        config: PdcConfig,
        topology: Rc<Topology>,
        orchestrator: EntityId,
        sink: SinkHandle,
        analysis_ids: AnalysisIds,
        params: AnalysisParams,
        stats: Rc<RefCell<PdcStats>>,
    ) -> Self {
        let label = format!("pdc@{}", topology.node(config.assigned_node).name);
        Self {
            label,
            config,
            topology,
            orchestrator,
            sink,
            analysis_ids,
            params,
            buckets: HashMap::new(),
            drained: HashSet::new(),
            stats,
        }
    }

    fn owns(&self, pmu: NodeId) -> bool {
        self.topology.closest_gnb(pmu) == Some(self.config.assigned_node)
    }

    fn on_data(&mut self, kernel: &mut Kernel, self_id: EntityId, mut sample: Sample) {
        if self.config.filter_foreign && !self.owns(sample.source) {
            log::warn!(
                "{}: dropping sample {} from PMU {} owned by another collector",
                self.label,
                sample.id,
                sample.source
            );
            self.stats.borrow_mut().rejected_foreign += 1;
            return;
        }

        let key = epoch_key(sample.generation_time);
        let real_arrival = sample.generation_time + sample.network_delay;

        if self.drained.contains(&key) {
            // The epoch already closed; record the straggler and drop it.
            sample.classification = Some(ArrivalClass::Late);
            self.sink.borrow_mut().record_arrival(
                self.topology.node(sample.source),
                &sample,
                ArrivalClass::Late,
            );
            self.stats.borrow_mut().dropped_late += 1;
            return;
        }

        let network_delay = sample.network_delay;
        let bucket = self.buckets.entry(key).or_insert_with(|| {
            kernel.schedule(self.config.max_wait, self_id, Signal::EpochTimeout(key));
            EpochBucket {
                arrivals: Vec::new(),
                first_arrival: real_arrival,
                deadline: real_arrival + self.config.max_wait,
            }
        });
        bucket.arrivals.push(Arrival {
            sample,
            real_arrival,
            network_delay,
        });
    }

    fn on_timeout(&mut self, kernel: &mut Kernel, key: EpochKey) {
        let Some(mut bucket) = self.buckets.remove(&key) else {
            return;
        };
        self.drained.insert(key);
        if bucket.arrivals.is_empty() {
            return;
        }

        bucket
            .arrivals
            .sort_by(|a, b| a.real_arrival.total_cmp(&b.real_arrival));
        debug_assert_eq!(bucket.arrivals[0].real_arrival, bucket.first_arrival);

        let mut stats = self.stats.borrow_mut();
        stats.total_buckets += 1;

        let mut on_time: Vec<Arrival> = Vec::new();
        for mut arrival in bucket.arrivals {
            let class = if arrival.real_arrival <= bucket.deadline {
                ArrivalClass::OnTime
            } else {
                ArrivalClass::Late
            };
            arrival.sample.classification = Some(class);
            self.sink.borrow_mut().record_arrival(
                self.topology.node(arrival.sample.source),
                &arrival.sample,
                class,
            );
            match class {
                ArrivalClass::OnTime => on_time.push(arrival),
                ArrivalClass::Late => stats.dropped_late += 1,
            }
        }

        if on_time.is_empty() {
            log::warn!("{}: epoch {key} closed with no on-time measurements", self.label);
            stats.timeout_buckets += 1;
            return;
        }

        let complete = on_time.len() >= self.config.required;
        let pdc_waiting_time = if complete {
            // Everyone is in: the window closed early, at the last on-time
            // arrival.
            on_time[on_time.len() - 1].real_arrival - on_time[0].real_arrival
        } else {
            self.config.max_wait
        };
        let batch = if complete {
            stats.complete_buckets += 1;
            BatchType::Complete
        } else {
            stats.timeout_buckets += 1;
            BatchType::Timeout
        };
        drop(stats);

        let analysis = GridAnalysis {
            id: self.analysis_ids.next(),
            epoch: key,
            absorbed: on_time.iter().map(|a| a.sample.id).collect(),
            on_time: on_time.len(),
            required: self.config.required,
            input_bits: on_time.len() as u64 * crate::task::PMU_SAMPLE_BITS,
            output_kb: self.params.output_kb,
            length_mi: self.params.length_mi,
            container_kb: self.params.container_kb,
            max_latency: self.params.max_latency,
            batch,
            bound_node: self.config.assigned_node,
            pdc_waiting_time,
            first_data_network_delay: on_time[0].network_delay,
            exec_time: None,
        };
        kernel.schedule_now(self.orchestrator, Signal::Orchestrate(Task::GridAnalysis(analysis)));
    }
}

impl Entity for PdcCollector {
    fn name(&self) -> &str {
        &self.label
    }

    fn on_signal(
        &mut self,
        kernel: &mut Kernel,
        self_id: EntityId,
        signal: Signal,
    ) -> Result<(), String> {
        match signal {
            Signal::DataReceived(sample) => {
                self.on_data(kernel, self_id, sample);
                Ok(())
            }
            Signal::EpochTimeout(key) => {
                self.on_timeout(kernel, key);
                Ok(())
            }
            other => {
                log::debug!("{}: ignoring {}", self.label, other.tag());
                Ok(())
            }
        }
    }
}
