//! Simulation clock, event queue, and entity registry.
//!
//! A single-threaded cooperative discrete-event loop: a binary heap of
//! `(due_time, seq)` entries dispatches exactly one event at a time, the
//! clock advances monotonically to each event's due time, and handlers run
//! to completion, interacting only by scheduling future events. `seq` is a
//! monotonic insertion counter, so events at the same due time fire in
//! scheduling order — a zero-delay event scheduled during dispatch of event
//! E fires strictly after E.
//!
//! There is no cancellation: a scheduled event always fires, and handlers
//! for state that has since been cleared are no-ops.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::SimError;
use crate::task::{EpochKey, GridAnalysis, Sample, Task};

/// Simulation time in seconds.
pub type SimTime = f64;

/// Handle of a registered entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub usize);

/// Event payloads exchanged between entities.
#[derive(Debug, Clone)]
pub enum Signal {
    /// A sample leaves its PMU and enters the transport path.
    TransferStart(Sample),
    /// The network model finished delaying a sample.
    TransferFinished(Sample),
    /// A sample reached its PDC collector.
    DataReceived(Sample),
    /// The collection window for an epoch elapsed.
    EpochTimeout(EpochKey),
    /// A task is handed to the orchestrator.
    Orchestrate(Task),
    /// A grid-analysis execution finished on its bound node.
    AnalysisFinished(GridAnalysis),
}

impl Signal {
    /// Short tag for diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::TransferStart(_) => "TRANSFER_START",
            Self::TransferFinished(_) => "TRANSFER_FINISHED",
            Self::DataReceived(_) => "DATA_RECEIVED",
            Self::EpochTimeout(_) => "EPOCH_TIMEOUT",
            Self::Orchestrate(_) => "SEND_TO_ORCH",
            Self::AnalysisFinished(_) => "ANALYSIS_FINISHED",
        }
    }
}

/// A scheduled event. Consumed exactly once.
#[derive(Debug)]
struct QueuedEvent {
    due: SimTime,
    seq: u64,
    target: EntityId,
    signal: Signal,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    // Reversed so the earliest (due, seq) pops first from the max-heap.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// The clock and event queue, handed to entity handlers for scheduling.
#[derive(Debug, Default)]
pub struct Kernel {
    queue: BinaryHeap<QueuedEvent>,
    clock: SimTime,
    seq: u64,
    halted: bool,
}

impl Kernel {
    /// The due time of the event currently in dispatch.
    pub fn clock(&self) -> SimTime {
        self.clock
    }

    /// Schedule a signal `delay` seconds from now. Negative delays clamp to
    /// zero so time never runs backwards.
    pub fn schedule(&mut self, delay: SimTime, target: EntityId, signal: Signal) {
        let due = self.clock + delay.max(0.0);
        self.push(due, target, signal);
    }

    /// Schedule a signal for immediate dispatch, after every event already
    /// queued for the current instant.
    pub fn schedule_now(&mut self, target: EntityId, signal: Signal) {
        self.schedule(0.0, target, signal);
    }

    /// Schedule a signal at an absolute time. Used for pre-population before
    /// the loop starts; times in the past clamp to the clock.
    pub fn schedule_at(&mut self, due: SimTime, target: EntityId, signal: Signal) {
        self.push(due.max(self.clock), target, signal);
    }

    /// Stop the loop after the current dispatch.
    pub fn terminate(&mut self) {
        self.halted = true;
    }

    /// Number of events waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn push(&mut self, due: SimTime, target: EntityId, signal: Signal) {
        let seq = self.seq;
        self.seq += 1;
        self.queue.push(QueuedEvent {
            due,
            seq,
            target,
            signal,
        });
    }
}

/// A simulation entity. Handlers run to completion on the scheduler thread;
/// an `Err` halts the run as a scheduler fault. Signals an entity does not
/// handle are logged and dropped by the entity itself, never fatal.
pub trait Entity {
    /// Stable name for diagnostics and fault reports.
    fn name(&self) -> &str;

    /// Handle one signal. `self_id` is the entity's own registration handle,
    /// for self-scheduled timers.
    fn on_signal(
        &mut self,
        kernel: &mut Kernel,
        self_id: EntityId,
        signal: Signal,
    ) -> Result<(), String>;
}

/// The registry plus run loop.
#[derive(Default)]
pub struct Engine {
    kernel: Kernel,
    entities: Vec<Option<Box<dyn Entity>>>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity and return its handle.
    pub fn register(&mut self, entity: Box<dyn Entity>) -> EntityId {
        let id = EntityId(self.entities.len());
        self.entities.push(Some(entity));
        id
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut Kernel {
        &mut self.kernel
    }

    /// Drain the queue, dispatching events in ascending `(due, seq)` order.
    ///
    /// Stops when the queue is empty, the next event lies beyond `until`, or
    /// an entity called [`Kernel::terminate`]. Returns the number of events
    /// dispatched.
    pub fn run(&mut self, until: Option<SimTime>) -> Result<u64, SimError> {
        let mut dispatched = 0u64;
        loop {
            if self.kernel.halted {
                break;
            }
            let Some(event) = self.kernel.queue.pop() else {
                break;
            };
            if let Some(limit) = until {
                if event.due > limit {
                    // Leave the event for a later run() call.
                    self.kernel.queue.push(event);
                    break;
                }
            }

            debug_assert!(event.due >= self.kernel.clock, "time ran backwards");
            self.kernel.clock = event.due;

            let Some(slot) = self.entities.get_mut(event.target.0) else {
                log::warn!(
                    "dropping {} for unregistered entity {:?}",
                    event.signal.tag(),
                    event.target
                );
                continue;
            };
            let Some(mut entity) = slot.take() else {
                log::warn!(
                    "dropping {} delivered to entity {:?} mid-dispatch",
                    event.signal.tag(),
                    event.target
                );
                continue;
            };

            let tag = event.signal.tag();
            let result = entity.on_signal(&mut self.kernel, event.target, event.signal);
            let name = entity.name().to_string();
            self.entities[event.target.0] = Some(entity);
            dispatched += 1;

            if let Err(detail) = result {
                return Err(SimError::Scheduler {
                    clock: self.kernel.clock,
                    entity: name,
                    detail: format!("{tag}: {detail}"),
                });
            }
        }
        Ok(dispatched)
    }
}
