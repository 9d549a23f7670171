//! Structured event and metric emission.
//!
//! `RunSink` is an injected capability handed to the network model, the
//! collectors, and the orchestrator at construction. Rows buffer in memory
//! during the run and flush to CSV files on shutdown:
//!
//! - `pmu_measurements.csv` — one row per arrival, on-time or late
//! - `grid_analysis.csv` — one row per executed analysis descriptor
//! - `network_usage.csv` — per-layer totals
//! - `run.json` — run metadata (written by the caller via [`write_meta`])
//!
//! A file that fails to write is logged and its rows counted as lost; sink
//! IO never aborts a simulation.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::network::Layer;
use crate::task::{ArrivalClass, GridAnalysis, Sample};
use crate::topology::Node;

/// Shared handle to the run's sink. The simulation is single-threaded
/// cooperative, so plain interior mutability suffices.
pub type SinkHandle = Rc<RefCell<RunSink>>;

/// Accumulated traffic for one network layer.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LayerUsage {
    pub total_kb: f64,
    pub transfers: u64,
}

impl LayerUsage {
    pub fn avg_kb(&self) -> f64 {
        if self.transfers == 0 {
            0.0
        } else {
            self.total_kb / self.transfers as f64
        }
    }
}

#[derive(Debug, Clone)]
struct PmuRow {
    time: f64,
    pmu: String,
    x: f64,
    y: f64,
    size_kb: f64,
    path: String,
    hop_sum: f64,
    status: ArrivalClass,
}

#[derive(Debug, Clone)]
struct AnalysisRow {
    time: f64,
    task_id: u64,
    gnb: String,
    window: i64,
    coverage: String,
    batch: String,
    input_kb: f64,
    output_kb: f64,
    max_latency: f64,
    length_mi: f64,
    wait_time: f64,
    exec_time: f64,
    net_time: f64,
    total_time: f64,
    pdc_waiting: f64,
    success: u8,
}

/// In-memory sink for one scenario run.
pub struct RunSink {
    label: String,
    /// V2/V3 analysis CSVs carry a GNBID column; V1 does not.
    with_gnb_column: bool,
    pmu_rows: Vec<PmuRow>,
    analysis_rows: Vec<AnalysisRow>,
    usage: BTreeMap<Layer, LayerUsage>,
    lost_rows: u64,
}

impl RunSink {
    pub fn new(label: impl Into<String>, with_gnb_column: bool) -> Self {
        Self {
            label: label.into(),
            with_gnb_column,
            pmu_rows: Vec::new(),
            analysis_rows: Vec::new(),
            usage: BTreeMap::new(),
            lost_rows: 0,
        }
    }

    /// Charge one transfer's bytes to a network layer.
    pub fn add_transfer(&mut self, layer: Layer, kb: f64) {
        let entry = self.usage.entry(layer).or_default();
        entry.total_kb += kb;
        entry.transfers += 1;
    }

    /// Record one sample arrival, classified on-time or late.
    pub fn record_arrival(&mut self, pmu: &Node, sample: &Sample, class: ArrivalClass) {
        self.pmu_rows.push(PmuRow {
            time: sample.generation_time,
            pmu: pmu.name.clone(),
            x: pmu.location.x,
            y: pmu.location.y,
            size_kb: sample.size_kb(),
            path: sample.path.clone(),
            hop_sum: sample.hop_sum(),
            status: class,
        });
    }

    /// Record one executed grid-analysis descriptor.
    pub fn record_analysis(&mut self, analysis: &GridAnalysis, bound_name: &str) {
        let exec_time = analysis.exec_time.unwrap_or(0.0);
        let net_time = analysis.first_data_network_delay;
        self.analysis_rows.push(AnalysisRow {
            time: crate::task::epoch_time(analysis.epoch),
            task_id: analysis.id,
            gnb: bound_name.to_string(),
            window: analysis.epoch,
            coverage: analysis.coverage(),
            batch: analysis.batch.to_string(),
            input_kb: analysis.input_kb(),
            output_kb: analysis.output_kb,
            max_latency: analysis.max_latency,
            length_mi: analysis.length_mi,
            wait_time: analysis.pdc_waiting_time,
            exec_time,
            net_time,
            total_time: net_time + analysis.pdc_waiting_time + exec_time,
            pdc_waiting: analysis.pdc_waiting_time,
            success: u8::from(analysis.batch == crate::task::BatchType::Complete),
        });
    }

    pub fn pmu_row_count(&self) -> usize {
        self.pmu_rows.len()
    }

    pub fn analysis_row_count(&self) -> usize {
        self.analysis_rows.len()
    }

    pub fn lost_rows(&self) -> u64 {
        self.lost_rows
    }

    /// Copy of the per-layer usage table.
    pub fn usage_snapshot(&self) -> BTreeMap<Layer, LayerUsage> {
        self.usage.clone()
    }

    /// Render the PMU-measurements CSV.
    pub fn pmu_csv(&self) -> String {
        let mut out = String::from("Time,PmuID,PmuCoordinates,DataSize,Path,HopSum,Status\n");
        for row in &self.pmu_rows {
            out.push_str(&format!(
                "{:.3},{},({:.1};{:.1}),{:.2},{},{:.6},{}\n",
                row.time, row.pmu, row.x, row.y, row.size_kb, row.path, row.hop_sum, row.status
            ));
        }
        out
    }

    /// Render the grid-analysis CSV.
    pub fn analysis_csv(&self) -> String {
        let mut out = String::from("Time,TaskID,");
        if self.with_gnb_column {
            out.push_str("GNBID,");
        }
        out.push_str(
            "Window,Coverage,BatchType,InputDataKB,OutputDataKB,MaxLatency,ComputationMI,\
             WaitTime,ExecTime,NetTime,TotalTime,Status,PDCWaitingTime,SuccessFlag\n",
        );
        for row in &self.analysis_rows {
            out.push_str(&format!("{:.3},{},", row.time, row.task_id));
            if self.with_gnb_column {
                out.push_str(&format!("{},", row.gnb));
            }
            out.push_str(&format!(
                "{},{},{},{:.2},{:.2},{:.3},{:.0},{:.6},{:.6},{:.6},{:.6},S,{:.6},{}\n",
                row.window,
                row.coverage,
                row.batch,
                row.input_kb,
                row.output_kb,
                row.max_latency,
                row.length_mi,
                row.wait_time,
                row.exec_time,
                row.net_time,
                row.total_time,
                row.pdc_waiting,
                row.success
            ));
        }
        out
    }

    /// Render the per-layer network-usage CSV.
    pub fn usage_csv(&self) -> String {
        let mut out = String::from("Layer,TotalKB,Transfers,AvgKB\n");
        for (layer, usage) in &self.usage {
            out.push_str(&format!(
                "{},{:.2},{},{:.2}\n",
                layer,
                usage.total_kb,
                usage.transfers,
                usage.avg_kb()
            ));
        }
        out
    }

    /// Flush all buffered rows to CSV files under `dir`.
    ///
    /// Individual file failures are logged and counted as lost rows; only a
    /// failure to create the directory itself is returned.
    pub fn flush(&mut self, dir: &Path) -> std::io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let files = [
            ("pmu_measurements.csv", self.pmu_csv(), self.pmu_rows.len()),
            ("grid_analysis.csv", self.analysis_csv(), self.analysis_rows.len()),
            ("network_usage.csv", self.usage_csv(), self.usage.len()),
        ];
        for (name, content, rows) in files {
            if let Err(e) = fs::write(dir.join(name), content) {
                log::error!("{}: failed to write {name}: {e}", self.label);
                self.lost_rows += rows as u64;
            }
        }
        Ok(dir.to_path_buf())
    }
}

/// Write serializable run metadata as `run.json` under `dir`.
pub fn write_meta<T: Serialize>(dir: &Path, meta: &T) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(meta)
        .map_err(|e| std::io::Error::other(format!("serialize run meta: {e}")))?;
    fs::write(dir.join("run.json"), json)
}

/// Compact UTC timestamp for output directory names.
/// Example: `20260801-142512`
pub fn timestamp_dir_name() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let (year, month, day, hour, min, sec) = secs_to_utc(secs);
    format!("{year:04}{month:02}{day:02}-{hour:02}{min:02}{sec:02}")
}

/// Convert seconds since Unix epoch to (year, month, day, hour, minute,
/// second) UTC. No leap second handling.
fn secs_to_utc(secs: u64) -> (u64, u64, u64, u64, u64, u64) {
    let sec = secs % 60;
    let min = (secs / 60) % 60;
    let hour = (secs / 3600) % 24;

    let mut days = secs / 86400;
    let mut year = 1970u64;

    loop {
        let days_in_year = if is_leap(year) { 366 } else { 365 };
        if days < days_in_year {
            break;
        }
        days -= days_in_year;
        year += 1;
    }

    let months_days: [u64; 12] = if is_leap(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 1;
    for dim in months_days {
        if days < dim {
            break;
        }
        days -= dim;
        month += 1;
    }

    (year, month, days + 1, hour, min, sec)
}

fn is_leap(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
