//! Job system error types.

use thiserror::Error;

/// Job system errors.
#[derive(Error, Debug)]
pub enum JobError {
    /// The pool was configured without any worker threads.
    #[error("Job system needs at least one worker thread")]
    NoWorkers,

    /// Every job list slot still has a batch in flight.
    #[error("No free job lists ({0} slots all in use)")]
    NoFreeJobLists(usize),

    /// `begin` was called while the previous batch is still draining.
    #[error("Job list {0} still has a batch in flight")]
    Busy(usize),

    /// `wait` was called on a list that was filled but never ended.
    #[error("Job list {0} was waited on before end() was called")]
    NotEnded(usize),

    /// One or more jobs in the batch panicked.
    #[error("{count} job(s) in list {list} panicked")]
    Panicked {
        /// Slot index of the list.
        list: usize,
        /// Number of panicked jobs.
        count: usize,
    },

    /// A worker thread could not be spawned.
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, JobError>;
