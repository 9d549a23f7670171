//! Synchronized measurement generation.
//!
//! All PMUs sample in lockstep: sample `k` within second `s` carries the
//! generation time `s + k/rate` for every PMU in the fleet. The whole run is
//! pre-populated into the scheduler before the loop starts, one
//! `TransferStart` per (PMU, tick).

use crate::config::SimSettings;
use crate::engine::{EntityId, Kernel, Signal};
use crate::task::{Sample, SampleIds};
use crate::topology::Topology;

/// Pre-populate the scheduler with `pmus × ⌊duration⌋ × rate` samples
/// addressed to the network model. Returns the number of samples enqueued.
pub fn populate(
    kernel: &mut Kernel,
    topology: &Topology,
    settings: &SimSettings,
    rate: u32,
    max_latency: f64,
    ids: &mut SampleIds,
    network: EntityId,
) -> u64 {
    let duration = settings.simulation_time;
    let whole_seconds = duration.floor() as u64;
    let mut enqueued = 0u64;

    for s in 0..whole_seconds {
        for k in 0..rate {
            let mut generation_time = s as f64 + f64::from(k) / f64::from(rate);
            // Ticks landing on the very end of the run are pulled inside it.
            if generation_time >= duration {
                generation_time = duration - 0.1;
            }
            for &pmu in topology.pmus() {
                let sample = Sample::new(ids.next(), generation_time, pmu, max_latency);
                kernel.schedule_at(generation_time, network, Signal::TransferStart(sample));
                enqueued += 1;
            }
        }
    }

    log::info!(
        "generator: {enqueued} samples across {} PMUs, {whole_seconds}s at {rate}/s",
        topology.pmus().len()
    );
    enqueued
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatacenterSpec, LocationSpec, TopologyConfig};
    use crate::engine::Engine;

    fn settings(n: usize, duration: f64) -> SimSettings {
        SimSettings {
            device_count: n,
            simulation_time: duration,
            length: 1000.0,
            width: 1000.0,
            edge_devices_range: 20.0,
            edge_datacenters_coverage: 800.0,
            cellular_bandwidth: 1e8,
            man_bandwidth: 1e9,
            wan_bandwidth: 1e10,
            cellular_latency: 0.01,
            man_latency: 0.005,
            wan_latency: 0.03,
            cellular_jitter: 0.0,
            man_jitter: 0.0,
            wan_jitter: 0.0,
            pmu_placement_seed: 1,
            network_jitter_seed: 1,
            propagation_per_meter: 0.0,
            pdc_max_wait: 0.045,
            grid_analysis_length_mi: 15_000.0,
            grid_analysis_output_kb: 50.0,
        }
    }

    fn topology(n: usize, duration: f64) -> Topology {
        let spec = |name: &str| DatacenterSpec {
            name: name.to_string(),
            location: LocationSpec { x: 500.0, y: 500.0 },
            cores: 8,
            mips: 40_000.0,
            ram_mb: 16_384,
            storage_mb: 131_072,
        };
        let cfg = TopologyConfig {
            edge_datacenters: vec![spec("GNB_1"), spec("TELCO")],
            cloud_datacenters: vec![spec("TSO")],
        };
        Topology::build(&settings(n, duration), &cfg).unwrap()
    }

    #[test]
    fn sample_count_is_pmus_times_seconds_times_rate() {
        // 5 PMUs, rate 3, duration 4 → exactly 60 samples queued.
        let topo = topology(5, 4.0);
        let mut engine = Engine::new();
        let network = EntityId(0);
        let mut ids = SampleIds::default();
        let n = populate(
            engine.kernel_mut(),
            &topo,
            &settings(5, 4.0),
            3,
            0.1,
            &mut ids,
            network,
        );
        assert_eq!(n, 60);
        assert_eq!(engine.kernel().pending(), 60);
        assert_eq!(ids.allocated(), 60);
    }

    #[test]
    fn fractional_duration_truncates() {
        let topo = topology(2, 2.9);
        let mut engine = Engine::new();
        let mut ids = SampleIds::default();
        let n = populate(
            engine.kernel_mut(),
            &topo,
            &settings(2, 2.9),
            2,
            0.1,
            &mut ids,
            EntityId(0),
        );
        // ⌊2.9⌋ = 2 whole seconds.
        assert_eq!(n, 2 * 2 * 2);
    }

    #[test]
    fn fleet_generation_times_are_synchronized() {
        let topo = topology(3, 2.0);
        let mut engine = Engine::new();
        let mut ids = SampleIds::default();
        populate(
            engine.kernel_mut(),
            &topo,
            &settings(3, 2.0),
            2,
            0.1,
            &mut ids,
            EntityId(0),
        );

        // Drain the queue through a capture entity: each distinct generation
        // time must appear exactly fleet-size times.
        use crate::engine::{Entity, Kernel, Signal};
        use std::cell::RefCell;
        use std::collections::HashMap;
        use std::rc::Rc;

        struct Capture {
            times: Rc<RefCell<Vec<f64>>>,
        }
        impl Entity for Capture {
            fn name(&self) -> &str {
                "capture"
            }
            fn on_signal(
                &mut self,
                _k: &mut Kernel,
                _id: crate::engine::EntityId,
                signal: Signal,
            ) -> Result<(), String> {
                if let Signal::TransferStart(s) = signal {
                    self.times.borrow_mut().push(s.generation_time);
                }
                Ok(())
            }
        }

        let times = Rc::new(RefCell::new(Vec::new()));
        let id = engine.register(Box::new(Capture { times: times.clone() }));
        assert_eq!(id, EntityId(0), "capture must sit at the pre-wired target");
        engine.run(None).unwrap();

        let mut per_tick: HashMap<i64, usize> = HashMap::new();
        for &t in times.borrow().iter() {
            *per_tick.entry(crate::task::epoch_key(t)).or_default() += 1;
        }
        assert_eq!(per_tick.len(), 4, "2s × rate 2 → 4 ticks");
        assert!(per_tick.values().all(|&c| c == 3));
    }

    #[test]
    fn tick_on_the_duration_boundary_is_clamped() {
        // duration = 1.0 with rate 1 only generates t = 0.0; force the clamp
        // path with a duration just above an integer tick.
        let topo = topology(1, 1.0);
        let mut engine = Engine::new();
        let mut ids = SampleIds::default();
        let mut s = settings(1, 1.0);
        s.simulation_time = 1.0;
        populate(engine.kernel_mut(), &topo, &s, 1, 0.1, &mut ids, EntityId(0));
        assert_eq!(engine.kernel().pending(), 1);
    }
}
