//! Runtime-checkable scheduler invariants
//!
//! These are used for:
//! 1. Post-step checking in `step` (enabled by `check_invariants`)
//! 2. Property-based testing with proptest
//!
//! # Invariants
//!
//! 1. **Single Runner**: exactly one process is RUNNING and it is the one in
//!    the running slot
//! 2. **Unique Membership**: every live process is in exactly one place -
//!    the running slot, the idle slot, one priority level or one wait set
//! 3. **Idle Never Queued**: the idle process is never in a container
//! 4. **State Consistency**: queued processes are READY at their level's
//!    priority, waiting processes are BLOCKED
//! 5. **Semaphore Accounting**: a semaphore never has more waiters than its
//!    negative count

use std::collections::BTreeMap;

use crate::queue::WaitQueue;
use crate::state::SchedulerState;
use crate::types::{Priority, ProcessKey, ProcessState};

/// An invariant violation with details
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// Description of what went wrong
    pub description: String,
}

/// Check all scheduler invariants.
///
/// Returns a list of violations (empty if all invariants hold).
pub fn check_all_invariants(state: &SchedulerState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    violations.extend(check_single_runner(state));
    violations.extend(check_unique_membership(state));
    violations.extend(check_idle_never_queued(state));
    violations.extend(check_state_consistency(state));
    violations.extend(check_semaphore_accounting(state));

    violations
}

/// Every container in the state, with a label for reporting
fn containers(state: &SchedulerState) -> Vec<(String, &WaitQueue)> {
    let mut all: Vec<(String, &WaitQueue)> = Priority::ALL
        .iter()
        .map(|p| (format!("level {p}"), &state.ready[p.level()]))
        .collect();
    all.extend(
        state
            .semaphores
            .iter()
            .map(|(id, sem)| (format!("semaphore {id}"), &sem.waiters)),
    );
    all.push(("reply-wait".into(), &state.reply_wait));
    all.push(("receive-wait".into(), &state.receive_wait));
    all
}

/// Invariant 1: exactly one RUNNING process, in the running slot
fn check_single_runner(state: &SchedulerState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    match state.processes.get(state.running) {
        None => violations.push(InvariantViolation {
            invariant: "single_runner",
            description: format!("running slot holds dangling key {}", state.running),
        }),
        Some(p) if p.state != ProcessState::Running => violations.push(InvariantViolation {
            invariant: "single_runner",
            description: format!("process {} holds the CPU in state {}", p.pid, p.state),
        }),
        Some(_) => {}
    }

    for (key, p) in &state.processes {
        if key != state.running && p.state == ProcessState::Running {
            violations.push(InvariantViolation {
                invariant: "single_runner",
                description: format!("process {} is RUNNING outside the running slot", p.pid),
            });
        }
    }

    violations
}

/// Invariant 2: every live process appears exactly once
fn check_unique_membership(state: &SchedulerState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut seen: BTreeMap<ProcessKey, usize> = BTreeMap::new();

    *seen.entry(state.running).or_default() += 1;
    if state.idle != state.running {
        *seen.entry(state.idle).or_default() += 1;
    }

    for (label, queue) in containers(state) {
        for key in queue.iter() {
            if !state.processes.contains(key) {
                violations.push(InvariantViolation {
                    invariant: "unique_membership",
                    description: format!("{label} holds dangling key {key}"),
                });
            }
            *seen.entry(key).or_default() += 1;
        }
    }

    for (key, p) in &state.processes {
        match seen.get(&key).copied().unwrap_or(0) {
            1 => {}
            0 => violations.push(InvariantViolation {
                invariant: "unique_membership",
                description: format!("process {} is not in any structure", p.pid),
            }),
            n => violations.push(InvariantViolation {
                invariant: "unique_membership",
                description: format!("process {} appears in {} structures", p.pid, n),
            }),
        }
    }

    violations
}

/// Invariant 3: the idle process is never queued
fn check_idle_never_queued(state: &SchedulerState) -> Vec<InvariantViolation> {
    containers(state)
        .into_iter()
        .filter(|(_, queue)| queue.contains(state.idle))
        .map(|(label, _)| InvariantViolation {
            invariant: "idle_never_queued",
            description: format!("idle process found in {label}"),
        })
        .collect()
}

/// Invariant 4: states and priorities agree with where processes live
fn check_state_consistency(state: &SchedulerState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for priority in Priority::ALL {
        for key in state.ready[priority.level()].iter() {
            let Some(p) = state.processes.get(key) else {
                continue;
            };
            if p.state != ProcessState::Ready || p.priority != priority {
                violations.push(InvariantViolation {
                    invariant: "state_consistency",
                    description: format!(
                        "process {} in level {} has state {} and priority {}",
                        p.pid, priority, p.state, p.priority
                    ),
                });
            }
        }
    }

    let waiting = containers(state).into_iter().skip(Priority::ALL.len());
    for (label, queue) in waiting {
        for key in queue.iter() {
            let Some(p) = state.processes.get(key) else {
                continue;
            };
            if p.state != ProcessState::Blocked {
                violations.push(InvariantViolation {
                    invariant: "state_consistency",
                    description: format!("process {} in {} has state {}", p.pid, label, p.state),
                });
            }
        }
    }

    violations
}

/// Invariant 5: waiters never outnumber the negative count
fn check_semaphore_accounting(state: &SchedulerState) -> Vec<InvariantViolation> {
    state
        .semaphores
        .iter()
        .filter_map(|(id, sem)| {
            let allowed = (-(sem.value as i64)).max(0) as usize;
            (sem.waiters.len() > allowed).then(|| InvariantViolation {
                invariant: "semaphore_accounting",
                description: format!(
                    "semaphore {} has {} waiters at value {}",
                    id,
                    sem.waiters.len(),
                    sem.value
                ),
            })
        })
        .collect()
}

/// Assert all invariants hold (panic if not)
pub fn assert_invariants(state: &SchedulerState) {
    let violations = check_all_invariants(state);
    if let Some(v) = violations.first() {
        panic!("Invariant violated: {} ({})", v.invariant, v.description);
    }
}
