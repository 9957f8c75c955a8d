//! Single-slot guard for check cycles
//!
//! At most one cycle holds the slot. The permit travels with the cycle task
//! and frees the slot when dropped, on every exit path including panics.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Where the current check cycle is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CycleState {
    Idle = 0,
    Evaluating = 1,
    WaitingGrace = 2,
    ReEvaluating = 3,
    Restarting = 4,
}

impl CycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CycleState::Evaluating,
            2 => CycleState::WaitingGrace,
            3 => CycleState::ReEvaluating,
            4 => CycleState::Restarting,
            _ => CycleState::Idle,
        }
    }
}

/// Per-workload guard owned by the scheduler
///
/// Clone is cheap and shares the slot.
#[derive(Debug, Clone)]
pub struct CycleGuard {
    slot: Arc<Semaphore>,
    state: Arc<AtomicU8>,
}

impl CycleGuard {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
            state: Arc::new(AtomicU8::new(CycleState::Idle as u8)),
        }
    }

    /// Take the slot if free. The cycle starts in `Evaluating`.
    pub fn try_acquire(&self) -> Option<CyclePermit> {
        let slot = Arc::clone(&self.slot).try_acquire_owned().ok()?;
        let permit = CyclePermit {
            state: Arc::clone(&self.state),
            _slot: slot,
        };
        permit.enter(CycleState::Evaluating);
        Some(permit)
    }

    /// Whether a cycle currently holds the slot
    pub fn is_held(&self) -> bool {
        self.slot.available_permits() == 0
    }

    pub fn state(&self) -> CycleState {
        CycleState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

impl Default for CycleGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of holding the guard slot
#[derive(Debug)]
pub struct CyclePermit {
    state: Arc<AtomicU8>,
    _slot: OwnedSemaphorePermit,
}

impl CyclePermit {
    /// Move the cycle to `state`
    pub fn enter(&self, state: CycleState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn state(&self) -> CycleState {
        CycleState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

impl Drop for CyclePermit {
    fn drop(&mut self) {
        // Runs before `_slot` is released
        self.state.store(CycleState::Idle as u8, Ordering::SeqCst);
    }
}
