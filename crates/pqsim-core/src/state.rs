//! Scheduler state - the aggregate every operation mutates
//!
//! `SchedulerState` owns the process arena, the three priority levels, the
//! reply and receive wait sets and the semaphore bank. Admission, selection
//! and blocking live here; `step` composes them into operations.
//!
//! Operations are not reentrant. The state is meant to be owned by a single
//! command handler; sharing it across threads needs external locking.

use slab::Slab;
use tracing::{debug, warn};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::queue::WaitQueue;
use crate::semaphore::SemaphoreBank;
use crate::step::Event;
use crate::types::{
    BlockReason, Location, Priority, Process, ProcessId, ProcessInfo, ProcessKey, ProcessState,
    SemaphoreInfo, SystemSnapshot, PRIORITY_LEVELS,
};

/// The idle process always holds this id
pub const IDLE_PID: ProcessId = ProcessId(0);

/// The whole scheduler: no I/O, no side effects beyond its own fields.
pub struct SchedulerState {
    /// Process arena; containers hold keys into it
    pub processes: Slab<Process>,
    /// Arena key of the idle process
    pub idle: ProcessKey,
    /// Arena key of the running process
    pub running: ProcessKey,
    /// Priority levels, index 0 dispatched first
    pub ready: [WaitQueue; PRIORITY_LEVELS],
    /// Blocked after sending
    pub reply_wait: WaitQueue,
    /// Blocked on an empty mailbox
    pub receive_wait: WaitQueue,
    /// Semaphore slots
    pub semaphores: SemaphoreBank,
    /// Next process ID to allocate
    pub next_pid: u16,
    /// Set once the idle process has been killed
    pub halted: bool,
    /// Policies
    pub config: SchedulerConfig,
}

impl SchedulerState {
    /// Boot with only the idle process, running.
    pub fn new(config: SchedulerConfig) -> Self {
        let mut processes = Slab::new();
        let mut idle_proc = Process::new(IDLE_PID);
        idle_proc.state = ProcessState::Running;
        let idle = processes.insert(idle_proc);

        let level = || match config.level_capacity {
            Some(cap) => WaitQueue::bounded(cap),
            None => WaitQueue::new(),
        };

        Self {
            processes,
            idle,
            running: idle,
            ready: [level(), level(), level()],
            reply_wait: WaitQueue::new(),
            receive_wait: WaitQueue::new(),
            semaphores: SemaphoreBank::new(),
            next_pid: IDLE_PID.0.wrapping_add(1),
            halted: false,
            config,
        }
    }

    /// Generate next process ID, wrapping at 65536
    pub fn alloc_pid(&mut self) -> ProcessId {
        let pid = ProcessId(self.next_pid);
        self.next_pid = self.next_pid.wrapping_add(1);
        pid
    }

    /// Undo the allocation of `pid` after a failed admission
    pub fn rollback_pid(&mut self, pid: ProcessId) {
        self.next_pid = pid.0;
    }

    // ========================================================================
    // Read-only accessors
    // ========================================================================

    /// The running process
    pub fn running_process(&self) -> Option<&Process> {
        self.processes.get(self.running)
    }

    /// PID of the running process
    pub fn running_pid(&self) -> Option<ProcessId> {
        self.running_process().map(|p| p.pid)
    }

    /// Whether the idle process holds the CPU
    pub fn idle_is_running(&self) -> bool {
        self.running == self.idle
    }

    /// Whether any process besides idle exists
    pub fn has_user_processes(&self) -> bool {
        self.processes.len() > 1
    }

    /// Find a process by id.
    ///
    /// Precedence is fixed: running slot, idle, priority levels high to low,
    /// semaphores in slot order, reply-wait, receive-wait.
    pub fn locate(&self, pid: ProcessId) -> Option<(Location, ProcessKey)> {
        if self.running_process().is_some_and(|p| p.pid == pid) {
            return Some((Location::Running, self.running));
        }
        if !self.idle_is_running() && self.processes.get(self.idle).is_some_and(|p| p.pid == pid) {
            return Some((Location::Idle, self.idle));
        }
        for priority in Priority::ALL {
            if let Some(key) = self.ready[priority.level()].find(&self.processes, pid) {
                return Some((Location::Ready(priority), key));
            }
        }
        for (id, sem) in self.semaphores.iter() {
            if let Some(key) = sem.waiters.find(&self.processes, pid) {
                return Some((Location::Semaphore(id), key));
            }
        }
        if let Some(key) = self.reply_wait.find(&self.processes, pid) {
            return Some((Location::ReplyWait, key));
        }
        if let Some(key) = self.receive_wait.find(&self.processes, pid) {
            return Some((Location::ReceiveWait, key));
        }
        None
    }

    /// Query one process without touching scheduling state
    pub fn process_info(&self, pid: ProcessId) -> Option<ProcessInfo> {
        let (location, key) = self.locate(pid)?;
        self.info_at(key, location)
    }

    /// Full dump of every container in dispatch order
    pub fn snapshot(&self) -> Option<SystemSnapshot> {
        let list = |queue: &WaitQueue, location: Location| -> Vec<ProcessInfo> {
            queue
                .iter()
                .filter_map(|key| self.info_at(key, location))
                .collect()
        };

        Some(SystemSnapshot {
            ready: Priority::ALL
                .iter()
                .map(|&p| list(&self.ready[p.level()], Location::Ready(p)))
                .collect(),
            semaphores: self
                .semaphores
                .iter()
                .map(|(id, sem)| SemaphoreInfo {
                    id,
                    value: sem.value,
                    waiters: list(&sem.waiters, Location::Semaphore(id)),
                })
                .collect(),
            receive_wait: list(&self.receive_wait, Location::ReceiveWait),
            reply_wait: list(&self.reply_wait, Location::ReplyWait),
            running: self.info_at(self.running, Location::Running)?,
        })
    }

    fn info_at(&self, key: ProcessKey, location: Location) -> Option<ProcessInfo> {
        self.processes.get(key).map(|p| ProcessInfo {
            pid: p.pid,
            is_idle: key == self.idle,
            priority: p.priority,
            state: p.state,
            location,
            mailbox: p.mailbox.clone(),
        })
    }

    fn process_mut(&mut self, key: ProcessKey) -> Result<&mut Process, SchedulerError> {
        self.processes
            .get_mut(key)
            .ok_or_else(|| SchedulerError::InvariantViolation(format!("dangling arena key {key}")))
    }

    // ========================================================================
    // Scheduling primitives
    // ========================================================================

    /// Place a process into the level matching its priority.
    ///
    /// A full level spills over to the remaining levels in ascending order
    /// and the process is relabelled to the level that took it. The idle
    /// process is accepted without being queued.
    pub fn admit(&mut self, key: ProcessKey, events: &mut Vec<Event>) -> Result<(), SchedulerError> {
        if key == self.idle {
            return Ok(());
        }

        let process = self.process_mut(key)?;
        let wanted = process.priority;
        let pid = process.pid;

        let candidates = core::iter::once(wanted)
            .chain(Priority::ALL.into_iter().filter(|&p| p != wanted));

        for priority in candidates {
            if self.ready[priority.level()].push(key).is_err() {
                continue;
            }

            let process = self.process_mut(key)?;
            process.priority = priority;
            process.state = ProcessState::Ready;

            if priority != wanted {
                warn!(pid = %pid, from = %wanted, to = %priority, "priority level full, reassigned");
                events.push(Event::PriorityReassigned {
                    pid,
                    from: wanted,
                    to: priority,
                });
            }
            return Ok(());
        }

        warn!(pid = %pid, "admission failed: every priority level is full");
        Err(SchedulerError::AdmissionExhausted(pid))
    }

    /// Select the next process to run.
    ///
    /// Strict priority: the first process of the first non-empty level, or
    /// idle if every level is empty. A process coming back from the reply or
    /// receive set has its mailbox delivered and cleared.
    pub fn dispatch_next(&mut self, events: &mut Vec<Event>) -> Result<ProcessKey, SchedulerError> {
        let next = self
            .ready
            .iter_mut()
            .find_map(|level| level.pop())
            .unwrap_or(self.idle);

        if !self.processes.contains(next) {
            return Err(SchedulerError::InvariantViolation(
                "no process available to dispatch".into(),
            ));
        }

        self.running = next;
        let is_idle = next == self.idle;
        let process = self.process_mut(next)?;
        process.state = ProcessState::Running;
        let pid = process.pid;
        let priority = process.priority;

        let delivered = if process.awaiting_delivery {
            process.awaiting_delivery = false;
            process.mailbox.take()
        } else {
            None
        };

        debug!(pid = %pid, priority = %priority, idle = is_idle, "dispatched");
        events.push(Event::Dispatched {
            pid,
            priority,
            idle: is_idle,
        });
        if let Some(message) = delivered {
            debug!(pid = %pid, sender = %message.sender, "message delivered on dispatch");
            events.push(Event::MessageDelivered { pid, message });
        }

        Ok(next)
    }

    /// Block the running process for `reason` and dispatch a replacement.
    ///
    /// The caller has already rejected the idle process.
    pub fn block_running(
        &mut self,
        reason: BlockReason,
        events: &mut Vec<Event>,
    ) -> Result<(), SchedulerError> {
        let key = self.running;
        if key == self.idle {
            return Err(SchedulerError::IllegalOnIdle("block"));
        }

        let queue = match reason {
            BlockReason::Semaphore(id) => &mut self.semaphores.get_mut(id)?.waiters,
            BlockReason::Reply => &mut self.reply_wait,
            BlockReason::Receive => &mut self.receive_wait,
        };
        queue
            .push(key)
            .map_err(|_| SchedulerError::InvariantViolation("wait set rejected a process".into()))?;

        let process = self.process_mut(key)?;
        process.state = ProcessState::Blocked;
        let pid = process.pid;

        debug!(pid = %pid, ?reason, "blocked");
        events.push(Event::Blocked { pid, reason });
        self.dispatch_next(events)?;
        Ok(())
    }

    /// Take a process out of a wait set and re-admit it.
    ///
    /// If no level accepts it, it goes back to its old position and the
    /// state is as before.
    pub fn unblock(
        &mut self,
        location: Location,
        key: ProcessKey,
        events: &mut Vec<Event>,
    ) -> Result<(), SchedulerError> {
        let index = self.detach(location, key)?;
        let delivers = matches!(location, Location::ReplyWait | Location::ReceiveWait);

        match self.admit(key, events) {
            Ok(()) => {
                let process = self.process_mut(key)?;
                process.awaiting_delivery = delivers;
                let pid = process.pid;
                debug!(pid = %pid, ?location, "unblocked");
                events.push(Event::Unblocked { pid });
                Ok(())
            }
            Err(e) => {
                if let (Some(index), Some(queue)) = (index, self.queue_mut(location)) {
                    queue.restore(index, key);
                }
                Err(e)
            }
        }
    }

    /// Remove `key` from the container `location` names.
    ///
    /// Returns the index it held, or `None` for the running and idle slots.
    pub fn detach(
        &mut self,
        location: Location,
        key: ProcessKey,
    ) -> Result<Option<usize>, SchedulerError> {
        let Some(queue) = self.queue_mut(location) else {
            return Ok(None);
        };
        let index = queue.index_of(key).ok_or_else(|| {
            SchedulerError::InvariantViolation(format!("arena key {key} missing from {location:?}"))
        })?;
        queue.remove(index);
        Ok(Some(index))
    }

    fn queue_mut(&mut self, location: Location) -> Option<&mut WaitQueue> {
        match location {
            Location::Running | Location::Idle => None,
            Location::Ready(p) => Some(&mut self.ready[p.level()]),
            Location::Semaphore(id) => self.semaphores.get_mut(id).ok().map(|s| &mut s.waiters),
            Location::ReplyWait => Some(&mut self.reply_wait),
            Location::ReceiveWait => Some(&mut self.receive_wait),
        }
    }

    /// Register a new process record and admit it.
    ///
    /// On admission failure the record is released and the id allocator
    /// rolled back, as if nothing happened.
    pub fn spawn(
        &mut self,
        template: impl FnOnce(ProcessId) -> Process,
        events: &mut Vec<Event>,
    ) -> Result<ProcessId, SchedulerError> {
        let pid = self.alloc_pid();
        let key = self.processes.insert(template(pid));

        if let Err(e) = self.admit(key, events) {
            self.processes.remove(key);
            self.rollback_pid(pid);
            return Err(e);
        }

        let priority = self.process_mut(key)?.priority;
        debug!(pid = %pid, priority = %priority, "process created");
        events.push(Event::Created { pid, priority });
        Ok(pid)
    }

    /// Release a detached process record
    pub fn release(&mut self, key: ProcessKey) -> Result<Process, SchedulerError> {
        let process = self
            .processes
            .try_remove(key)
            .ok_or_else(|| SchedulerError::InvariantViolation(format!("dangling arena key {key}")))?;
        debug!(pid = %process.pid, "process released");
        Ok(process)
    }
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
