//! Pure step function - one operator command in, one result out
//!
//! This module contains `step(state, operation) -> StepResult`. Every state
//! transformation the simulator performs happens here - no I/O, no side
//! effects beyond the provided state.
//!
//! # Design
//!
//! The step function takes:
//! - Current scheduler state
//! - An operation (one of the operator commands)
//!
//! And returns:
//! - Updated state (via mutation)
//! - The operation outcome, or an error
//! - The list of events (scheduling decisions) the operation caused
//!
//! A failed operation leaves the state untouched and carries no events.

use serde::Serialize;
use tracing::{debug, error};

use crate::config::{ReplyPolicy, SelfSendPolicy};
use crate::error::SchedulerError;
use crate::invariants::check_all_invariants;
use crate::state::SchedulerState;
use crate::types::{
    BlockReason, Location, Message, Priority, Process, ProcessId, ProcessInfo, ProcessKey,
    ProcessState, SemaphoreId, SystemSnapshot,
};

// ============================================================================
// Operation definitions
// ============================================================================

/// Operation variants - every command the operator can issue
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Create a process at top priority
    Create,

    /// Copy the running process
    Fork,

    /// Kill a process by id
    Kill { pid: ProcessId },

    /// Kill the running process
    Exit,

    /// The running process's time slice ran out
    QuantumExpire,

    /// Send to a process and block awaiting a reply
    Send { target: ProcessId, text: String },

    /// Take the pending message, or block until one arrives
    Receive,

    /// Deliver a reply and unblock the target
    Reply { target: ProcessId, text: String },

    /// Initialize a semaphore slot
    SemaphoreInit { id: SemaphoreId, value: i32 },

    /// Semaphore P on behalf of the running process
    SemaphoreP { id: SemaphoreId },

    /// Semaphore V on behalf of the running process
    SemaphoreV { id: SemaphoreId },

    /// Query one process
    ProcessInfo { pid: ProcessId },

    /// Query everything
    DumpState,
}

impl Operation {
    /// Whether this operation only reads state
    pub fn is_query(&self) -> bool {
        matches!(self, Operation::ProcessInfo { .. } | Operation::DumpState)
    }
}

// ============================================================================
// Operation results
// ============================================================================

/// What a successful operation produced
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// New process admitted
    Created { pid: ProcessId },
    /// Running process copied
    Forked { parent: ProcessId, pid: ProcessId },
    /// Process removed; `halted` when it was the idle process
    Killed { process: ProcessInfo, halted: bool },
    /// Running process gave up the CPU at `priority`
    QuantumExpired { pid: ProcessId, priority: Priority },
    /// Message written to the target's mailbox
    Sent {
        target: ProcessId,
        sender_blocked: bool,
        receiver_unblocked: bool,
    },
    /// Mailbox read, or the caller blocked waiting for one
    Received {
        message: Option<Message>,
        blocked: bool,
    },
    /// Reply written to the target's mailbox
    Replied { target: ProcessId, unblocked: bool },
    /// Semaphore slot initialized
    SemaphoreInitialized { id: SemaphoreId, value: i32 },
    /// P executed
    SemaphoreWaited {
        id: SemaphoreId,
        value: i32,
        blocked: bool,
    },
    /// V executed
    SemaphoreSignaled {
        id: SemaphoreId,
        value: i32,
        readied: Option<ProcessId>,
    },
    /// One process
    ProcessInfo(ProcessInfo),
    /// Everything
    Snapshot(SystemSnapshot),
}

/// Scheduling decisions made while executing an operation, in order
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Process admitted for the first time
    Created { pid: ProcessId, priority: Priority },
    /// Admission spilled over to another level
    PriorityReassigned {
        pid: ProcessId,
        from: Priority,
        to: Priority,
    },
    /// Quantum expiry lowered (or kept at the floor) a priority
    Demoted {
        pid: ProcessId,
        from: Priority,
        to: Priority,
    },
    /// Running process entered a wait set
    Blocked { pid: ProcessId, reason: BlockReason },
    /// Process left a wait set for a priority level
    Unblocked { pid: ProcessId },
    /// Process took the CPU
    Dispatched {
        pid: ProcessId,
        priority: Priority,
        idle: bool,
    },
    /// Mailbox surfaced to a process resuming from a message wait
    MessageDelivered { pid: ProcessId, message: Message },
    /// Process removed from the system
    Killed { pid: ProcessId },
    /// Idle process killed, simulation over
    Halted,
}

/// Result of a step operation
#[derive(Clone, Debug)]
pub struct StepResult {
    /// The operation result
    pub result: Result<Outcome, SchedulerError>,
    /// Events generated by this step
    pub events: Vec<Event>,
}

impl StepResult {
    /// Whether the simulation ended with this step
    pub fn halted(&self) -> bool {
        self.events.contains(&Event::Halted)
    }
}

// ============================================================================
// The step function
// ============================================================================

/// Execute one operation on the scheduler state.
///
/// # Properties
///
/// 1. **Deterministic**: same state + operation always gives the same result
/// 2. **Atomic on failure**: an error leaves the state as it was
/// 3. **Single runner**: afterwards exactly one process is running, unless
///    the idle process was killed
pub fn step(state: &mut SchedulerState, operation: Operation) -> StepResult {
    if state.halted {
        return StepResult {
            result: Err(SchedulerError::Halted),
            events: vec![],
        };
    }

    let is_query = operation.is_query();
    let mut events = Vec::new();

    let result = match operation {
        Operation::Create => step_create(state, &mut events),
        Operation::Fork => step_fork(state, &mut events),
        Operation::Kill { pid } => step_kill(state, pid, &mut events),
        Operation::Exit => step_exit(state, &mut events),
        Operation::QuantumExpire => step_quantum_expire(state, &mut events),
        Operation::Send { target, text } => step_send(state, target, &text, &mut events),
        Operation::Receive => step_receive(state, &mut events),
        Operation::Reply { target, text } => step_reply(state, target, &text, &mut events),
        Operation::SemaphoreInit { id, value } => step_semaphore_init(state, id, value),
        Operation::SemaphoreP { id } => step_semaphore_p(state, id, &mut events),
        Operation::SemaphoreV { id } => step_semaphore_v(state, id, &mut events),
        Operation::ProcessInfo { pid } => state
            .process_info(pid)
            .map(Outcome::ProcessInfo)
            .ok_or(SchedulerError::NotFound(pid)),
        Operation::DumpState => state
            .snapshot()
            .map(Outcome::Snapshot)
            .ok_or_else(|| SchedulerError::InvariantViolation("running slot is empty".into())),
    };

    if let Err(e) = &result {
        debug!(error = %e, "operation failed");
        events.clear();
        return StepResult { result, events };
    }

    if !is_query && state.config.check_invariants && !state.halted {
        let violations = check_all_invariants(state);
        if !violations.is_empty() {
            for v in &violations {
                error!(invariant = v.invariant, description = %v.description, "invariant violated");
            }
            let summary = violations
                .iter()
                .map(|v| v.invariant)
                .collect::<Vec<_>>()
                .join(", ");
            return StepResult {
                result: Err(SchedulerError::InvariantViolation(summary)),
                events,
            };
        }
    }

    StepResult { result, events }
}

// ============================================================================
// Operation handlers
// ============================================================================

fn step_create(state: &mut SchedulerState, events: &mut Vec<Event>) -> Result<Outcome, SchedulerError> {
    let pid = state.spawn(Process::new, events)?;
    Ok(Outcome::Created { pid })
}

fn step_fork(state: &mut SchedulerState, events: &mut Vec<Event>) -> Result<Outcome, SchedulerError> {
    if state.idle_is_running() {
        return Err(SchedulerError::IllegalOnIdle("fork"));
    }

    let parent = state
        .running_process()
        .cloned()
        .ok_or_else(|| SchedulerError::InvariantViolation("running slot is empty".into()))?;

    let pid = state.spawn(
        |pid| Process {
            pid,
            priority: parent.priority,
            state: ProcessState::Ready,
            mailbox: parent.mailbox.clone(),
            awaiting_delivery: false,
        },
        events,
    )?;

    Ok(Outcome::Forked {
        parent: parent.pid,
        pid,
    })
}

fn step_kill(
    state: &mut SchedulerState,
    pid: ProcessId,
    events: &mut Vec<Event>,
) -> Result<Outcome, SchedulerError> {
    let (location, key) = state.locate(pid).ok_or(SchedulerError::NotFound(pid))?;
    kill_at(state, location, key, events)
}

fn step_exit(state: &mut SchedulerState, events: &mut Vec<Event>) -> Result<Outcome, SchedulerError> {
    let key = state.running;
    kill_at(state, Location::Running, key, events)
}

fn kill_at(
    state: &mut SchedulerState,
    location: Location,
    key: ProcessKey,
    events: &mut Vec<Event>,
) -> Result<Outcome, SchedulerError> {
    let info = {
        let p = state
            .processes
            .get(key)
            .ok_or_else(|| SchedulerError::InvariantViolation(format!("dangling arena key {key}")))?;
        ProcessInfo {
            pid: p.pid,
            is_idle: key == state.idle,
            priority: p.priority,
            state: p.state,
            location,
            mailbox: p.mailbox.clone(),
        }
    };

    if key == state.idle {
        if state.has_user_processes() {
            return Err(SchedulerError::IllegalOnIdle("kill"));
        }
        debug!(pid = %info.pid, "idle process killed, halting");
        state.halted = true;
        events.push(Event::Killed { pid: info.pid });
        events.push(Event::Halted);
        return Ok(Outcome::Killed {
            process: info,
            halted: true,
        });
    }

    state.detach(location, key)?;
    state.release(key)?;
    events.push(Event::Killed { pid: info.pid });

    if location == Location::Running {
        state.dispatch_next(events)?;
    }

    Ok(Outcome::Killed {
        process: info,
        halted: false,
    })
}

fn step_quantum_expire(
    state: &mut SchedulerState,
    events: &mut Vec<Event>,
) -> Result<Outcome, SchedulerError> {
    let key = state.running;
    let current = state
        .processes
        .get(key)
        .cloned()
        .ok_or_else(|| SchedulerError::InvariantViolation("running slot is empty".into()))?;

    if key == state.idle {
        // Idle is never demoted or queued; it just offers the CPU.
        if let Some(p) = state.processes.get_mut(key) {
            p.state = ProcessState::Ready;
        }
        state.dispatch_next(events)?;
        return Ok(Outcome::QuantumExpired {
            pid: current.pid,
            priority: current.priority,
        });
    }

    let demoted = current.priority.demoted();
    if let Some(p) = state.processes.get_mut(key) {
        p.priority = demoted;
        p.state = ProcessState::Ready;
    }

    let mut admitted = Vec::new();
    if let Err(e) = state.admit(key, &mut admitted) {
        if let Some(p) = state.processes.get_mut(key) {
            p.priority = current.priority;
            p.state = ProcessState::Running;
        }
        return Err(e);
    }

    events.push(Event::Demoted {
        pid: current.pid,
        from: current.priority,
        to: demoted,
    });
    events.append(&mut admitted);

    let priority = state
        .processes
        .get(key)
        .map(|p| p.priority)
        .unwrap_or(demoted);

    state.dispatch_next(events)?;

    Ok(Outcome::QuantumExpired {
        pid: current.pid,
        priority,
    })
}

fn step_send(
    state: &mut SchedulerState,
    target: ProcessId,
    text: &str,
    events: &mut Vec<Event>,
) -> Result<Outcome, SchedulerError> {
    let sender = state
        .running_pid()
        .ok_or_else(|| SchedulerError::InvariantViolation("running slot is empty".into()))?;
    let message = Message::new(sender, text)?;

    let (location, key) = state.locate(target).ok_or(SchedulerError::NotFound(target))?;
    if location == Location::Running && state.config.self_send == SelfSendPolicy::Forbid {
        return Err(SchedulerError::SelfTarget);
    }

    let receiver_unblocked = location == Location::ReceiveWait;
    if receiver_unblocked {
        state.unblock(location, key, events)?;
    }

    if let Some(p) = state.processes.get_mut(key) {
        p.mailbox = Some(message);
    }
    debug!(from = %sender, to = %target, "message sent");

    let sender_blocked = !state.idle_is_running();
    if sender_blocked {
        state.block_running(BlockReason::Reply, events)?;
    }

    Ok(Outcome::Sent {
        target,
        sender_blocked,
        receiver_unblocked,
    })
}

fn step_receive(state: &mut SchedulerState, events: &mut Vec<Event>) -> Result<Outcome, SchedulerError> {
    let key = state.running;
    let pending = state.processes.get_mut(key).and_then(|p| {
        p.awaiting_delivery = false;
        p.mailbox.take()
    });

    if let Some(message) = pending {
        return Ok(Outcome::Received {
            message: Some(message),
            blocked: false,
        });
    }

    if state.idle_is_running() {
        return Ok(Outcome::Received {
            message: None,
            blocked: false,
        });
    }

    state.block_running(BlockReason::Receive, events)?;
    Ok(Outcome::Received {
        message: None,
        blocked: true,
    })
}

fn step_reply(
    state: &mut SchedulerState,
    target: ProcessId,
    text: &str,
    events: &mut Vec<Event>,
) -> Result<Outcome, SchedulerError> {
    let replier = state
        .running_pid()
        .ok_or_else(|| SchedulerError::InvariantViolation("running slot is empty".into()))?;
    let message = Message::new(replier, text)?;

    let (location, key) = match state.config.reply_policy {
        ReplyPolicy::AwaitingOnly => match state.reply_wait.find(&state.processes, target) {
            Some(key) => (Location::ReplyWait, key),
            None if state.locate(target).is_some() => {
                return Err(SchedulerError::NotAwaitingReply(target))
            }
            None => return Err(SchedulerError::NotFound(target)),
        },
        ReplyPolicy::AnyProcess => state.locate(target).ok_or(SchedulerError::NotFound(target))?,
    };

    let unblocked = matches!(location, Location::ReplyWait | Location::ReceiveWait);
    if unblocked {
        state.unblock(location, key, events)?;
    }

    if let Some(p) = state.processes.get_mut(key) {
        p.mailbox = Some(message);
    }
    debug!(from = %replier, to = %target, "reply sent");

    Ok(Outcome::Replied { target, unblocked })
}

fn step_semaphore_init(
    state: &mut SchedulerState,
    id: SemaphoreId,
    value: i32,
) -> Result<Outcome, SchedulerError> {
    state.semaphores.init(id, value)?;
    debug!(sem = %id, value, "semaphore initialized");
    Ok(Outcome::SemaphoreInitialized { id, value })
}

fn step_semaphore_p(
    state: &mut SchedulerState,
    id: SemaphoreId,
    events: &mut Vec<Event>,
) -> Result<Outcome, SchedulerError> {
    state.semaphores.get(id)?;
    if state.idle_is_running() {
        return Err(SchedulerError::IllegalOnIdle("block"));
    }

    let value = state
        .semaphores
        .get(id)?
        .value
        .checked_sub(1)
        .ok_or(SchedulerError::SemaphoreOverflow(id))?;

    let blocked = value < 0;
    if blocked {
        state.block_running(BlockReason::Semaphore(id), events)?;
    }
    state.semaphores.get_mut(id)?.value = value;

    Ok(Outcome::SemaphoreWaited { id, value, blocked })
}

fn step_semaphore_v(
    state: &mut SchedulerState,
    id: SemaphoreId,
    events: &mut Vec<Event>,
) -> Result<Outcome, SchedulerError> {
    let sem = state.semaphores.get(id)?;
    let value = sem
        .value
        .checked_add(1)
        .ok_or(SchedulerError::SemaphoreOverflow(id))?;
    let front = sem.waiters.iter().next();

    let readied = match front {
        Some(key) => {
            state.unblock(Location::Semaphore(id), key, events)?;
            state.processes.get(key).map(|p| p.pid)
        }
        None => None,
    };

    state.semaphores.get_mut(id)?.value = value;

    Ok(Outcome::SemaphoreSignaled { id, value, readied })
}
