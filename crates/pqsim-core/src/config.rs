//! Scheduler configuration
//!
//! Policies that variants of this scheduler disagree on are explicit
//! settings here rather than hidden choices.

use serde::{Deserialize, Serialize};

/// What happens when a process sends a message to itself
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelfSendPolicy {
    /// Deliver to the sender's own mailbox and block it awaiting a reply
    #[default]
    Allow,
    /// Reject with `SelfTarget`
    Forbid,
}

/// Which processes a reply may target
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplyPolicy {
    /// Only processes in the reply-wait set
    #[default]
    AwaitingOnly,
    /// Any live process; those awaiting a reply are also unblocked
    AnyProcess,
}

/// Scheduler configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SchedulerConfig {
    /// Capacity of each priority level; `None` is unbounded
    pub level_capacity: Option<usize>,
    /// Self-send handling
    pub self_send: SelfSendPolicy,
    /// Reply targeting
    pub reply_policy: ReplyPolicy,
    /// Run the invariant checker after every mutating step
    pub check_invariants: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            level_capacity: None,
            self_send: SelfSendPolicy::default(),
            reply_policy: ReplyPolicy::default(),
            check_invariants: true,
        }
    }
}
