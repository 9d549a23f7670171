//! End-to-end scenario tests for gridsim-core.
//!
//! Each test wires a full scenario (topology → generator → network →
//! collectors → orchestrator → sink), drains the event loop, and checks the
//! collection-window protocol through the run report and the rendered CSVs.

use std::rc::Rc;

use gridsim_core::config::{AppSpec, DatacenterSpec, LocationSpec};
use gridsim_core::{
    ApplicationConfig, Point, RunReport, Scenario, ScenarioKind, SimSettings, SinkHandle, Topology,
    TopologyConfig,
};

fn settings() -> SimSettings {
    SimSettings {
        device_count: 2,
        simulation_time: 2.0,
        length: 2000.0,
        width: 2000.0,
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
        pmu_placement_seed: 7,
        network_jitter_seed: 7,
        propagation_per_meter: 30.0e-6,
        pdc_max_wait: 0.045,
        grid_analysis_length_mi: 15_000.0,
        grid_analysis_output_kb: 50.0,
    }
}

fn datacenter(name: &str, x: f64, y: f64) -> DatacenterSpec {
    DatacenterSpec {
        name: name.to_string(),
        location: LocationSpec { x, y },
        cores: 8,
        mips: 40_000.0,
        ram_mb: 16_384,
        storage_mb: 131_072,
    }
}

fn application(rate: u32) -> ApplicationConfig {
    ApplicationConfig {
        applications: vec![AppSpec {
            name: "PMU_Data".to_string(),
            rate,
            latency: 0.1,
            container_size_kb: 50.0,
        }],
    }
}

/// Wire a scenario over literal PMU positions and run it to completion.
fn run_fixed(
    kind: ScenarioKind,
    settings: &SimSettings,
    topology_config: &TopologyConfig,
    pmus: &[Point],
    rate: u32,
) -> (RunReport, SinkHandle) {
    let topology =
        Rc::new(Topology::with_pmu_locations(settings, topology_config, pmus).unwrap());
    let mut scenario =
        Scenario::build_with_topology(kind, settings, topology, &application(rate)).unwrap();
    let report = scenario.run().unwrap();
    (report, scenario.sink())
}

fn csv_column<'a>(row: &'a str, index: usize) -> &'a str {
    row.split(',').nth(index).unwrap_or_else(|| panic!("row too short: {row}"))
}

// ---------------------------------------------------------------------------
// S1: V3 happy path
// ---------------------------------------------------------------------------

#[test]
fn v3_happy_path_completes_every_epoch() {
    let mut s = settings();
    s.device_count = 2;
    let topo = TopologyConfig {
        edge_datacenters: vec![datacenter("GNB_1", 50.0, 0.0), datacenter("TELCO", 0.0, 0.0)],
        cloud_datacenters: vec![datacenter("TSO", 0.0, 0.0)],
    };
    let (report, sink) = run_fixed(
        ScenarioKind::V3,
        &s,
        &topo,
        &[Point::new(0.0, 0.0), Point::new(100.0, 0.0)],
        1,
    );

    // Two epochs at t = 0.0 and t = 1.0, each complete with both samples.
    assert_eq!(report.total_buckets(), 2);
    assert_eq!(report.complete_buckets(), 2);
    assert_eq!(report.dropped_late(), 0);
    assert_eq!(report.pmu_rows, 4);

    // Both PMUs sit 50 m from the GNB, so their delays are identical and the
    // waiting window collapses to zero.
    let sink = sink.borrow();
    let csv = sink.analysis_csv();
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(csv_column(row, 5), "COMPLETE");
        assert_eq!(csv_column(row, 4), "2/2");
        let waiting: f64 = csv_column(row, 15).parse().unwrap();
        assert!(waiting.abs() < 1e-12, "equal distances must yield zero spread");
        assert_eq!(csv_column(row, 16), "1");
        // Input: 2 on-time samples × 2 KB.
        assert_eq!(csv_column(row, 6), "4.00");
    }

    // Hop accounting: 2 epochs × 2 transfers of 2 KB, all cellular.
    let usage = sink.usage_snapshot();
    assert_eq!(usage.len(), 1);
    let cellular = usage.values().next().unwrap();
    assert_eq!(cellular.transfers, 4);
    assert!((cellular.total_kb - 8.0).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// S2: V1 late arrival
// ---------------------------------------------------------------------------

#[test]
fn v1_distant_pmu_misses_the_window() {
    let mut s = settings();
    s.device_count = 3;
    s.propagation_per_meter = 4.0e-6;
    s.simulation_time = 1.0;
    let topo = TopologyConfig {
        edge_datacenters: vec![datacenter("GNB_1", 0.0, 0.0), datacenter("TELCO", 0.0, 0.0)],
        cloud_datacenters: vec![datacenter("TSO", 0.0, 0.0)],
    };
    // Two PMUs next to the GNB; the third far enough that its extra
    // propagation alone (4 μs/m) exceeds the 45 ms window.
    let (report, sink) = run_fixed(
        ScenarioKind::V1,
        &s,
        &topo,
        &[
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(15_000.0, 0.0),
        ],
        1,
    );

    assert_eq!(report.total_buckets(), 1);
    assert_eq!(report.timeout_buckets(), 1);
    assert_eq!(report.dropped_late(), 1);

    let sink = sink.borrow();
    let pmu_csv = sink.pmu_csv();
    assert_eq!(pmu_csv.matches(",OK").count(), 2);
    assert_eq!(pmu_csv.matches("DEADLINE_MISSED").count(), 1);
    let late_row = pmu_csv
        .lines()
        .find(|l| l.ends_with("DEADLINE_MISSED"))
        .unwrap();
    assert!(late_row.contains("PMU_2"), "the distant PMU is the late one");

    // V1 analysis CSV has no GNBID column.
    let analysis_csv = sink.analysis_csv();
    let header = analysis_csv.lines().next().unwrap();
    assert!(!header.contains("GNBID"));
    let row = analysis_csv.lines().nth(1).unwrap();
    assert_eq!(csv_column(row, 3), "2/3");
    assert_eq!(csv_column(row, 4), "TIMEOUT");
    let waiting: f64 = csv_column(row, 14).parse().unwrap();
    assert!((waiting - 0.045).abs() < 1e-9);
    assert_eq!(csv_column(row, 15), "0");
}

// ---------------------------------------------------------------------------
// S3: V2 routing
// ---------------------------------------------------------------------------

#[test]
fn v2_fleet_splits_cleanly_between_gnb_collectors() {
    let mut s = settings();
    s.device_count = 4;
    s.propagation_per_meter = 4.0e-6;
    let topo = TopologyConfig {
        edge_datacenters: vec![
            datacenter("GNB_1", 0.0, 0.0),
            datacenter("GNB_2", 1000.0, 0.0),
            datacenter("TELCO", 500.0, 0.0),
        ],
        cloud_datacenters: vec![datacenter("TSO", 5000.0, 0.0)],
    };
    let (report, sink) = run_fixed(
        ScenarioKind::V2,
        &s,
        &topo,
        &[
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(990.0, 0.0),
            Point::new(1010.0, 0.0),
        ],
        1,
    );

    // Each GNB collector owns exactly two PMUs and absorbs only those.
    assert_eq!(report.collectors.len(), 2);
    for collector in &report.collectors {
        assert_eq!(collector.required, 2);
        assert_eq!(collector.stats.total_buckets, 2);
        assert_eq!(collector.stats.complete_buckets, 2);
        assert_eq!(collector.stats.rejected_foreign, 0);
    }

    let sink = sink.borrow();
    let csv = sink.analysis_csv();
    assert!(csv.lines().next().unwrap().contains("GNBID"));
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 4, "two epochs per collector");
    for row in &rows {
        assert_eq!(csv_column(row, 4), "2/2");
        assert_eq!(csv_column(row, 5), "COMPLETE");
    }
    assert_eq!(rows.iter().filter(|r| csv_column(r, 2) == "GNB_1").count(), 2);
    assert_eq!(rows.iter().filter(|r| csv_column(r, 2) == "GNB_2").count(), 2);
}

// ---------------------------------------------------------------------------
// S4: generator count
// ---------------------------------------------------------------------------

#[test]
fn generator_queue_holds_the_full_run_before_the_loop() {
    let mut s = settings();
    s.device_count = 5;
    s.simulation_time = 4.0;
    let topo = TopologyConfig {
        edge_datacenters: vec![
            datacenter("GNB_1", 1000.0, 1000.0),
            datacenter("TELCO", 0.0, 0.0),
        ],
        cloud_datacenters: vec![datacenter("TSO", 0.0, 0.0)],
    };
    let scenario = Scenario::build(ScenarioKind::V3, &s, &topo, &application(3)).unwrap();
    assert_eq!(scenario.pending_events(), 60, "5 PMUs × 4 s × 3/s");
}

// ---------------------------------------------------------------------------
// S5: determinism
// ---------------------------------------------------------------------------

#[test]
fn identical_seeds_reproduce_byte_identical_csvs() {
    let mut s = settings();
    s.device_count = 6;
    s.simulation_time = 3.0;
    s.cellular_jitter = 0.002;
    s.man_jitter = 0.001;
    s.wan_jitter = 0.005;
    let topo = TopologyConfig {
        edge_datacenters: vec![
            datacenter("GNB_1", 500.0, 500.0),
            datacenter("GNB_2", 1500.0, 1500.0),
            datacenter("TELCO", 1000.0, 1000.0),
        ],
        cloud_datacenters: vec![datacenter("TSO", 5000.0, 5000.0)],
    };

    let run = |s: &SimSettings| {
        let mut scenario = Scenario::build(ScenarioKind::V2, s, &topo, &application(2)).unwrap();
        scenario.run().unwrap();
        let sink = scenario.sink();
        let sink = sink.borrow();
        (sink.pmu_csv(), sink.analysis_csv(), sink.usage_csv())
    };

    let first = run(&s);
    let second = run(&s);
    assert_eq!(first.0, second.0);
    assert_eq!(first.1, second.1);
    assert_eq!(first.2, second.2);

    // A different jitter seed must change the recorded delays.
    let mut reseeded = s.clone();
    reseeded.network_jitter_seed = 8;
    let third = run(&reseeded);
    assert_ne!(first.0, third.0);
}

// ---------------------------------------------------------------------------
// S6: epoch isolation
// ---------------------------------------------------------------------------

#[test]
fn pending_epoch_is_untouched_by_other_epochs() {
    let mut s = settings();
    s.device_count = 2;
    s.simulation_time = 1.0;
    let topo = TopologyConfig {
        edge_datacenters: vec![datacenter("GNB_1", 0.0, 0.0), datacenter("TELCO", 0.0, 0.0)],
        cloud_datacenters: vec![datacenter("TSO", 0.0, 0.0)],
    };
    // PMU_0 is adjacent; PMU_1's propagation alone is 600 ms, so each of its
    // samples lands long after its epoch drained, interleaved with later
    // epochs' traffic.
    let (report, sink) = run_fixed(
        ScenarioKind::V3,
        &s,
        &topo,
        &[Point::new(0.0, 0.0), Point::new(20_000.0, 0.0)],
        2,
    );

    assert_eq!(report.total_buckets(), 2, "epochs 0.0 and 0.5");
    assert_eq!(report.timeout_buckets(), 2);
    assert_eq!(report.dropped_late(), 2);

    let sink = sink.borrow();
    let csv = sink.analysis_csv();
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 2);
    // Each epoch's descriptor reflects only its own on-time arrival; the
    // slow PMU never retroactively joins a closed bucket.
    assert_eq!(csv_column(rows[0], 3), "0");
    assert_eq!(csv_column(rows[1], 3), "500");
    for row in &rows {
        assert_eq!(csv_column(row, 4), "1/2");
        assert_eq!(csv_column(row, 5), "TIMEOUT");
    }
}

// ---------------------------------------------------------------------------
// Universal invariants
// ---------------------------------------------------------------------------

#[test]
fn waiting_time_invariants_hold_across_a_jittered_run() {
    let mut s = settings();
    s.device_count = 10;
    s.simulation_time = 5.0;
    s.cellular_jitter = 0.010;
    s.man_jitter = 0.004;
    let topo = TopologyConfig {
        edge_datacenters: vec![
            datacenter("GNB_1", 400.0, 400.0),
            datacenter("GNB_2", 1600.0, 1600.0),
            datacenter("TELCO", 1000.0, 1000.0),
        ],
        cloud_datacenters: vec![datacenter("TSO", 5000.0, 5000.0)],
    };
    let mut scenario = Scenario::build(ScenarioKind::V2, &s, &topo, &application(2)).unwrap();
    let report = scenario.run().unwrap();
    let sink = scenario.sink();
    let sink = sink.borrow();

    // Every generated sample is recorded exactly once, on time or late.
    assert_eq!(report.pmu_rows as u64, report.generated_samples);

    let csv = sink.analysis_csv();
    let mut checked = 0;
    for row in csv.lines().skip(1) {
        let batch = csv_column(row, 5);
        let waiting: f64 = csv_column(row, 15).parse().unwrap();
        match batch {
            "COMPLETE" => {
                assert!(waiting <= s.pdc_max_wait + 1e-9, "complete batch overran: {row}");
                assert_eq!(csv_column(row, 16), "1");
            }
            "TIMEOUT" => {
                assert!((waiting - s.pdc_max_wait).abs() < 1e-12, "timeout batch: {row}");
                assert_eq!(csv_column(row, 16), "0");
            }
            other => panic!("unexpected batch type {other}"),
        }
        checked += 1;
    }
    assert_eq!(checked as u64, report.total_buckets() - count_no_on_time(&report));
    assert_eq!(report.orchestrator.analyses_completed, checked as u64);
}

/// Buckets that drained with zero on-time samples emit no descriptor.
fn count_no_on_time(report: &RunReport) -> u64 {
    let emitted = report.orchestrator.analyses_dispatched;
    report.total_buckets() - emitted
}

#[test]
fn placement_and_assignment_replay_per_seed() {
    let mut s = settings();
    s.device_count = 24;
    let topo = TopologyConfig {
        edge_datacenters: vec![
            datacenter("GNB_1", 200.0, 200.0),
            datacenter("GNB_2", 1800.0, 200.0),
            datacenter("GNB_3", 1000.0, 1800.0),
            datacenter("TELCO", 1000.0, 1000.0),
        ],
        cloud_datacenters: vec![datacenter("TSO", 5000.0, 5000.0)],
    };
    let a = Topology::build(&s, &topo).unwrap();
    let b = Topology::build(&s, &topo).unwrap();
    for (&pa, &pb) in a.pmus().iter().zip(b.pmus()) {
        assert_eq!(a.node(pa).location, b.node(pb).location);
        assert_eq!(a.closest_gnb(pa), b.closest_gnb(pb));
    }
}

// ---------------------------------------------------------------------------
// Boundaries
// ---------------------------------------------------------------------------

#[test]
fn minimal_run_is_one_complete_zero_wait_epoch() {
    let mut s = settings();
    s.device_count = 1;
    s.simulation_time = 1.0;
    s.cellular_bandwidth = 1e15;
    s.cellular_latency = 0.0;
    s.propagation_per_meter = 0.0;
    let topo = TopologyConfig {
        edge_datacenters: vec![datacenter("GNB_1", 0.0, 0.0), datacenter("TELCO", 0.0, 0.0)],
        cloud_datacenters: vec![datacenter("TSO", 0.0, 0.0)],
    };
    let (report, sink) = run_fixed(ScenarioKind::V3, &s, &topo, &[Point::new(0.0, 0.0)], 1);

    assert_eq!(report.total_buckets(), 1);
    assert_eq!(report.complete_buckets(), 1);
    let csv = sink.borrow().analysis_csv();
    let row = csv.lines().nth(1).unwrap();
    assert_eq!(csv_column(row, 4), "1/1");
    let waiting: f64 = csv_column(row, 15).parse().unwrap();
    assert_eq!(waiting, 0.0);
}

#[test]
fn lone_pmu_anchors_its_own_window() {
    // The deadline is a function of arrivals only: with a single PMU whose
    // cellular delay dwarfs the window, each epoch's lone sample still
    // creates its bucket, anchors the deadline, and completes the batch.
    let mut s = settings();
    s.device_count = 1;
    s.simulation_time = 2.0;
    let topo = TopologyConfig {
        edge_datacenters: vec![datacenter("GNB_1", 0.0, 0.0), datacenter("TELCO", 0.0, 0.0)],
        cloud_datacenters: vec![datacenter("TSO", 0.0, 0.0)],
    };
    let (report, _) = run_fixed(ScenarioKind::V3, &s, &topo, &[Point::new(20_000.0, 0.0)], 1);
    assert_eq!(report.total_buckets(), 2);
    assert_eq!(report.complete_buckets(), 2);
    assert_eq!(report.dropped_late(), 0);
}

#[test]
fn second_pmu_inside_or_outside_the_window() {
    let topo = TopologyConfig {
        edge_datacenters: vec![datacenter("GNB_1", 0.0, 0.0), datacenter("TELCO", 0.0, 0.0)],
        cloud_datacenters: vec![datacenter("TSO", 0.0, 0.0)],
    };
    let mut s = settings();
    s.device_count = 2;
    s.simulation_time = 1.0;

    // 1000 m apart → 30 ms spread, inside the 45 ms window.
    let (report, sink) = run_fixed(
        ScenarioKind::V3,
        &s,
        &topo,
        &[Point::new(0.0, 0.0), Point::new(1000.0, 0.0)],
        1,
    );
    assert_eq!(report.complete_buckets(), 1);
    let csv = sink.borrow().analysis_csv();
    let waiting: f64 = csv_column(csv.lines().nth(1).unwrap(), 15).parse().unwrap();
    assert!((waiting - 0.030).abs() < 1e-9, "spread equals the extra propagation");

    // 2000 m apart → 60 ms spread, beyond the window.
    let (report, sink) = run_fixed(
        ScenarioKind::V3,
        &s,
        &topo,
        &[Point::new(0.0, 0.0), Point::new(2000.0, 0.0)],
        1,
    );
    assert_eq!(report.timeout_buckets(), 1);
    assert_eq!(report.dropped_late(), 1);
    let csv = sink.borrow().analysis_csv();
    let row = csv.lines().nth(1).unwrap();
    assert_eq!(csv_column(row, 4), "1/2");
    let waiting: f64 = csv_column(row, 15).parse().unwrap();
    assert!((waiting - 0.045).abs() < 1e-12);
}
