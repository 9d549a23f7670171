//! Error taxonomy for simulation setup and execution.
//!
//! Configuration and topology problems are fatal before the event loop
//! starts. A fault inside an entity handler halts the run and surfaces the
//! simulation clock and the offending entity. Sink IO failures are *not*
//! represented here: they are logged, counted as lost rows, and the run
//! continues.

use thiserror::Error;

/// Errors surfaced by scenario construction and the event loop.
#[derive(Debug, Error)]
pub enum SimError {
    /// Missing or malformed configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// The topology cannot support the scenario (no TELCO, no GNBs, no TSO,
    /// unassignable PMU). Fatal at initialization.
    #[error("topology error: {0}")]
    Topology(String),

    /// An entity handler faulted. The scheduler stops at `clock` with sinks
    /// still flushable by the caller.
    #[error("scheduler fault at t={clock:.6}s in entity '{entity}': {detail}")]
    Scheduler {
        clock: f64,
        entity: String,
        detail: String,
    },

    /// Reading a configuration file from disk failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Shorthand for a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Shorthand for a topology error.
    pub fn topology(msg: impl Into<String>) -> Self {
        Self::Topology(msg.into())
    }
}
