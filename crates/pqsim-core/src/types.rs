//! Core scheduler types
//!
//! This module contains the fundamental types used throughout the scheduler
//! core. All types here are pure data - the transitions live in `state` and
//! `step`.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Number of priority levels in the feedback queue
pub const PRIORITY_LEVELS: usize = 3;

/// Number of semaphore slots
pub const SEMAPHORE_COUNT: usize = 5;

/// Maximum mailbox text length, in characters
pub const MAX_MESSAGE_LEN: usize = 40;

/// Process identifier.
///
/// Ids are allocated monotonically and wrap at 65536. Reuse after
/// wraparound is not checked against live processes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u16);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Arena key of a process record
pub type ProcessKey = usize;

/// Scheduling priority. `High` is dispatched first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Priority {
    /// Level 0
    High = 0,
    /// Level 1
    Medium = 1,
    /// Level 2
    Low = 2,
}

impl Priority {
    /// All levels in dispatch order
    pub const ALL: [Priority; PRIORITY_LEVELS] = [Priority::High, Priority::Medium, Priority::Low];

    /// Level index (0 = highest)
    pub fn level(self) -> usize {
        self as usize
    }

    /// One level lower, clamped at `Low`
    pub fn demoted(self) -> Self {
        match self {
            Priority::High => Priority::Medium,
            Priority::Medium | Priority::Low => Priority::Low,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// Process scheduling state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    /// Waiting in a priority level
    Ready,
    /// Holding the CPU
    Running,
    /// Waiting in a semaphore, reply or receive set
    Blocked,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Blocked => "BLOCKED",
        };
        f.write_str(s)
    }
}

/// Mailbox content: one undelivered message and its sender
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sender (or replier) process ID
    pub sender: ProcessId,
    /// Message text, at most `MAX_MESSAGE_LEN` characters
    pub text: String,
}

impl Message {
    /// Build a message, rejecting text longer than `MAX_MESSAGE_LEN`.
    pub fn new(sender: ProcessId, text: &str) -> Result<Self, SchedulerError> {
        let len = text.chars().count();
        if len > MAX_MESSAGE_LEN {
            return Err(SchedulerError::MessageTooLong { len });
        }
        Ok(Self {
            sender,
            text: text.to_owned(),
        })
    }
}

/// Process control block
#[derive(Clone, Debug)]
pub struct Process {
    /// Process ID
    pub pid: ProcessId,
    /// Current priority level
    pub priority: Priority,
    /// Current state
    pub state: ProcessState,
    /// Single-slot mailbox; a new delivery overwrites it
    pub mailbox: Option<Message>,
    /// Set when unblocked out of the reply or receive set; the mailbox is
    /// surfaced on the next dispatch
    pub awaiting_delivery: bool,
}

impl Process {
    /// A fresh process at top priority with an empty mailbox
    pub fn new(pid: ProcessId) -> Self {
        Self {
            pid,
            priority: Priority::High,
            state: ProcessState::Ready,
            mailbox: None,
            awaiting_delivery: false,
        }
    }
}

/// Semaphore slot identifier, validated into `0..SEMAPHORE_COUNT`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SemaphoreId(u8);

impl SemaphoreId {
    /// Validate a raw slot number
    pub fn new(id: u8) -> Option<Self> {
        if (id as usize) < SEMAPHORE_COUNT {
            Some(Self(id))
        } else {
            None
        }
    }

    /// Slot index
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// All slots in order
    pub fn all() -> impl Iterator<Item = SemaphoreId> {
        (0..SEMAPHORE_COUNT as u8).map(SemaphoreId)
    }
}

impl TryFrom<u8> for SemaphoreId {
    type Error = SchedulerError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::new(id).ok_or(SchedulerError::SemaphoreNotFound(id))
    }
}

impl fmt::Display for SemaphoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a process currently lives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    /// The running slot
    Running,
    /// The idle process, not running
    Idle,
    /// A priority level
    Ready(Priority),
    /// A semaphore's wait set
    Semaphore(SemaphoreId),
    /// Blocked after sending, awaiting a reply
    ReplyWait,
    /// Blocked on an empty mailbox
    ReceiveWait,
}

/// Why a process blocked
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockReason {
    /// Semaphore P with no units left
    Semaphore(SemaphoreId),
    /// Sent a message, waits for a reply
    Reply,
    /// Empty mailbox on receive
    Receive,
}

// ============================================================================
// Info types for query responses
// ============================================================================

/// Read-only view of one process
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    /// Process ID
    pub pid: ProcessId,
    /// Whether this is the idle process
    pub is_idle: bool,
    /// Priority level
    pub priority: Priority,
    /// Scheduling state
    pub state: ProcessState,
    /// Where the process lives
    pub location: Location,
    /// Undelivered message, if any
    pub mailbox: Option<Message>,
}

/// Read-only view of one initialized semaphore
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SemaphoreInfo {
    /// Slot
    pub id: SemaphoreId,
    /// Counter value
    pub value: i32,
    /// Waiters, longest-waiting first
    pub waiters: Vec<ProcessInfo>,
}

/// Full system dump. Every container is listed in dispatch order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SystemSnapshot {
    /// Priority levels 0, 1, 2
    pub ready: Vec<Vec<ProcessInfo>>,
    /// Initialized semaphores in slot order
    pub semaphores: Vec<SemaphoreInfo>,
    /// Blocked on receive
    pub receive_wait: Vec<ProcessInfo>,
    /// Blocked awaiting a reply
    pub reply_wait: Vec<ProcessInfo>,
    /// The running process
    pub running: ProcessInfo,
}
