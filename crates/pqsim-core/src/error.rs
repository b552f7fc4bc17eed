//! Scheduler error types
//!
//! Every error is recoverable at the command boundary: a failed operation
//! leaves the state untouched, except `InvariantViolation` which reports a
//! bug after the fact.

use thiserror::Error;

use crate::types::{ProcessId, SemaphoreId};

/// Errors returned by scheduler operations
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Referenced process does not exist anywhere
    #[error("process {0} not found")]
    NotFound(ProcessId),

    /// Semaphore slot number outside `0..SEMAPHORE_COUNT`
    #[error("semaphore {0} does not exist")]
    SemaphoreNotFound(u8),

    /// Semaphore slot can only be initialized once
    #[error("semaphore {0} is already initialized")]
    AlreadyInitialized(SemaphoreId),

    /// P or V on a slot never initialized
    #[error("semaphore {0} is not initialized")]
    Uninitialized(SemaphoreId),

    /// P or V would push the counter past the range of `i32`
    #[error("semaphore {0} counter would overflow")]
    SemaphoreOverflow(SemaphoreId),

    /// Operation would fork, block or kill the idle process
    #[error("cannot {0} the idle process")]
    IllegalOnIdle(&'static str),

    /// No priority level accepted the process
    #[error("no priority level can accept process {0}")]
    AdmissionExhausted(ProcessId),

    /// Self-send is disabled by configuration
    #[error("a process cannot send to itself")]
    SelfTarget,

    /// Reply target is not waiting for a reply
    #[error("process {0} is not awaiting a reply")]
    NotAwaitingReply(ProcessId),

    /// Message text exceeds the mailbox size
    #[error("message is {len} characters, the limit is 40")]
    MessageTooLong {
        /// Length in characters
        len: usize,
    },

    /// The idle process was killed; the simulation is over
    #[error("the simulation has ended")]
    Halted,

    /// Internal consistency check failed
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
