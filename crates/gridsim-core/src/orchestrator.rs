//! Orchestrator: routes the two task families.
//!
//! `PmuData` tasks bypass execution entirely; they exist only for
//! accounting. `GridAnalysis` descriptors are dispatched to their bound
//! node's compute queue, and the analysis sink is notified on completion.
//! The sum type keeps the families apart; the analysis id range (≥ 10 000)
//! is carried for CSV consumers, not as a type check.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use crate::engine::{Entity, EntityId, Kernel, Signal};
use crate::sink::SinkHandle;
use crate::task::{GridAnalysis, Task};
use crate::topology::Topology;

/// Orchestrator counters, exposed through the run report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrchStats {
    /// `PmuData` tasks that arrived and bypassed execution.
    pub pmu_data_bypassed: u64,
    pub analyses_dispatched: u64,
    pub analyses_completed: u64,
}

/// The orchestrator entity.
pub struct Orchestrator {
    topology: Rc<Topology>,
    sink: SinkHandle,
    stats: Rc<RefCell<OrchStats>>,
}

impl Orchestrator {
    pub fn new(topology: Rc<Topology>, sink: SinkHandle, stats: Rc<RefCell<OrchStats>>) -> Self {
        Self {
            topology,
            sink,
            stats,
        }
    }

    fn dispatch(
        &mut self,
        kernel: &mut Kernel,
        self_id: EntityId,
        mut analysis: GridAnalysis,
    ) -> Result<(), String> {
        let node = self.topology.node(analysis.bound_node);
        let capacity = node
            .capacity
            .as_ref()
            .ok_or_else(|| format!("analysis {} bound to '{}' which has no compute", analysis.id, node.name))?;

        // One analysis container occupies a single core.
        let exec_time = analysis.length_mi / capacity.mips_per_core;
        analysis.exec_time = Some(exec_time);
        self.stats.borrow_mut().analyses_dispatched += 1;
        kernel.schedule(exec_time, self_id, Signal::AnalysisFinished(analysis));
        Ok(())
    }

    fn complete(&mut self, analysis: &GridAnalysis) {
        let bound = &self.topology.node(analysis.bound_node).name;
        self.sink.borrow_mut().record_analysis(analysis, bound);
        self.stats.borrow_mut().analyses_completed += 1;
        log::debug!(
            "analysis {} for epoch {} finished on {bound} ({})",
            analysis.id,
            analysis.epoch,
            analysis.batch
        );
    }
}

impl Entity for Orchestrator {
    fn name(&self) -> &str {
        "orchestrator"
    }

    fn on_signal(
        &mut self,
        kernel: &mut Kernel,
        self_id: EntityId,
        signal: Signal,
    ) -> Result<(), String> {
        match signal {
            Signal::Orchestrate(Task::GridAnalysis(analysis)) => {
                self.dispatch(kernel, self_id, analysis)
            }
            Signal::Orchestrate(Task::PmuData(sample)) => {
                // Accounting only; measurement samples are never executed.
                self.stats.borrow_mut().pmu_data_bypassed += 1;
                log::debug!("sample {} routed through orchestrator, bypassing execution", sample.id);
                Ok(())
            }
            Signal::AnalysisFinished(analysis) => {
                self.complete(&analysis);
                Ok(())
            }
            other => {
                log::debug!("orchestrator: ignoring {}", other.tag());
                Ok(())
            }
        }
    }
}
