//! pqsim Core - Pure Scheduler State Machine
//!
//! This crate contains the scheduler and synchronization engine of the
//! simulator: a three-level multilevel feedback queue with round robin inside
//! each level, blocking send/receive/reply messaging and counting semaphores.
//!
//! # Design Principles
//!
//! 1. **No I/O**: parsing and rendering live in `pqsim-shell`
//! 2. **One entry point**: every operator command goes through `step()`
//! 3. **Deterministic**: same state + operation always gives the same result
//! 4. **Checked**: invariants can run after every step
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       pqsim-core                            │
//! │                                                             │
//! │   ┌────────────────┐    ┌───────────────┐                   │
//! │   │ SchedulerState │    │    step()     │                   │
//! │   │  - processes   │───▶│  Operation →  │                   │
//! │   │  - ready[3]    │    │  Outcome +    │                   │
//! │   │  - wait sets   │    │  Events       │                   │
//! │   │  - semaphores  │    └───────────────┘                   │
//! │   └────────────────┘                                        │
//! │                                                             │
//! │   ┌────────────────┐    ┌───────────────┐                   │
//! │   │   WaitQueue    │    │  Invariants   │                   │
//! │   │ SemaphoreBank  │    │  Assertions   │                   │
//! │   └────────────────┘    └───────────────┘                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              │ used by
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      pqsim-shell                            │
//! │   - command parsing and validation                          │
//! │   - text / JSON rendering                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - `types` - Process, priority, message and query types
//! - `queue` - FIFO container shared by levels and wait sets
//! - `semaphore` - Semaphore slots
//! - `state` - `SchedulerState`: admission, dispatch, blocking
//! - `step` - `step(state, operation) -> StepResult`
//! - `invariants` - Invariant assertions
//! - `config` - Policies (self-send, reply targets, level capacity)
//! - `error` - `SchedulerError`

pub mod config;
pub mod error;
pub mod invariants;
pub mod queue;
pub mod semaphore;
pub mod state;
pub mod step;
pub mod types;

// Re-export all public types for convenient access
pub use config::{ReplyPolicy, SchedulerConfig, SelfSendPolicy};
pub use error::SchedulerError;
pub use invariants::{assert_invariants, check_all_invariants, InvariantViolation};
pub use state::{SchedulerState, IDLE_PID};
pub use step::{step, Event, Operation, Outcome, StepResult};
pub use types::{
    BlockReason, Location, Message, Priority, Process, ProcessId, ProcessInfo, ProcessState,
    SemaphoreId, SemaphoreInfo, SystemSnapshot, MAX_MESSAGE_LEN, PRIORITY_LEVELS,
    SEMAPHORE_COUNT,
};
