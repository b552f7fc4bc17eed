//! Counting semaphores
//!
//! The bank has `SEMAPHORE_COUNT` slots. A slot moves from uninitialized to
//! initialized once and never back.

use crate::error::SchedulerError;
use crate::queue::WaitQueue;
use crate::types::{SemaphoreId, SEMAPHORE_COUNT};

/// An initialized semaphore
#[derive(Clone, Debug)]
pub struct Semaphore {
    /// Counter; negative values count blocked waiters
    pub value: i32,
    /// Blocked processes, longest-waiting first
    pub waiters: WaitQueue,
}

impl Semaphore {
    /// Create a semaphore with an initial value
    pub fn new(value: i32) -> Self {
        Self {
            value,
            waiters: WaitQueue::new(),
        }
    }
}

/// Fixed set of semaphore slots
#[derive(Clone, Debug, Default)]
pub struct SemaphoreBank {
    slots: [Option<Semaphore>; SEMAPHORE_COUNT],
}

impl SemaphoreBank {
    /// All slots uninitialized
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize a slot. Fails if it was already initialized.
    pub fn init(&mut self, id: SemaphoreId, value: i32) -> Result<(), SchedulerError> {
        let slot = &mut self.slots[id.index()];
        if slot.is_some() {
            return Err(SchedulerError::AlreadyInitialized(id));
        }
        *slot = Some(Semaphore::new(value));
        Ok(())
    }

    /// Get an initialized semaphore
    pub fn get(&self, id: SemaphoreId) -> Result<&Semaphore, SchedulerError> {
        self.slots[id.index()]
            .as_ref()
            .ok_or(SchedulerError::Uninitialized(id))
    }

    /// Get an initialized semaphore mutably
    pub fn get_mut(&mut self, id: SemaphoreId) -> Result<&mut Semaphore, SchedulerError> {
        self.slots[id.index()]
            .as_mut()
            .ok_or(SchedulerError::Uninitialized(id))
    }

    /// Initialized semaphores in slot order
    pub fn iter(&self) -> impl Iterator<Item = (SemaphoreId, &Semaphore)> {
        SemaphoreId::all().filter_map(move |id| self.slots[id.index()].as_ref().map(|s| (id, s)))
    }
}
