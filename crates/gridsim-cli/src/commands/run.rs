//! `gridsim run` — execute one placement scenario and write its outputs.

use std::path::PathBuf;

use gridsim_core::sink::{timestamp_dir_name, write_meta};
use gridsim_core::{RunReport, Scenario, ScenarioKind};

use super::{load_application, load_world};

/// Run the run command.
pub fn run(
    variant: &str,
    settings_path: &str,
    topology_path: &str,
    application_path: &str,
    output: Option<&str>,
) {
    let kind: ScenarioKind = variant.parse().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(2);
    });

    let (settings, topology) = load_world(settings_path, topology_path);
    let application = load_application(application_path);

    let mut scenario =
        Scenario::build(kind, &settings, &topology, &application).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        });

    let out_root = output.map_or_else(|| PathBuf::from("output"), PathBuf::from);
    let out_dir = out_root.join(kind.label()).join(timestamp_dir_name());

    println!(
        "gridsim {} — scenario {kind}: {} PMUs, {}s, {} events queued",
        gridsim_core::VERSION,
        settings.device_count,
        settings.simulation_time,
        scenario.pending_events()
    );

    let result = scenario.run();
    let sink = scenario.sink();

    // Flush whatever was recorded, fault or not; sink IO trouble is logged
    // inside flush and never overrides the run's own outcome.
    let flushed = sink.borrow_mut().flush(&out_dir);
    if let Err(e) = &flushed {
        log::error!("could not create output directory {}: {e}", out_dir.display());
    }

    match result {
        Ok(report) => {
            if flushed.is_ok() {
                if let Err(e) = write_meta(&out_dir, &report) {
                    log::error!("could not write run.json: {e}");
                }
            }
            print_summary(&report, &out_dir);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn print_summary(report: &RunReport, out_dir: &std::path::Path) {
    println!(
        "  samples: {} generated, {} rows recorded ({} late)",
        report.generated_samples,
        report.pmu_rows,
        report.dropped_late()
    );
    println!(
        "  epochs: {} total — {} complete, {} timeout",
        report.total_buckets(),
        report.complete_buckets(),
        report.timeout_buckets()
    );
    for collector in &report.collectors {
        println!(
            "    PDC {}: {}/{} complete, {} late, {} foreign (requires {} PMUs)",
            collector.node,
            collector.stats.complete_buckets,
            collector.stats.total_buckets,
            collector.stats.dropped_late,
            collector.stats.rejected_foreign,
            collector.required
        );
    }
    println!(
        "  analyses: {} dispatched, {} completed",
        report.orchestrator.analyses_dispatched, report.orchestrator.analyses_completed
    );
    if report.lost_rows > 0 {
        println!("  WARNING: {} rows lost to sink IO failures", report.lost_rows);
    }
    println!("  output: {}", out_dir.display());
}
