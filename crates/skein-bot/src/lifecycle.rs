//! Driver lifecycle.
//!
//! Lazy start and idle stop are modeled as an explicit state machine so the
//! bookkeeping is testable on its own: `Inert -> Starting -> Active ->
//! Stopping -> Inert`, with every other transition rejected. A
//! [`DriverHandle`] couples the state cell with the cancellation token and
//! join handle of the running task, and guarantees at most one background
//! task per driver instance.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle states of a background driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DriverState {
    /// No task exists. The initial and final state.
    Inert = 0,
    /// A start was claimed; the task is being set up.
    Starting = 1,
    /// The task is running.
    Active = 2,
    /// A stop was claimed; the task is winding down.
    Stopping = 3,
}

impl DriverState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Inert,
            1 => Self::Starting,
            2 => Self::Active,
            _ => Self::Stopping,
        }
    }
}

/// An atomically updated [`DriverState`] with guarded transitions.
#[derive(Debug)]
pub struct DriverCell {
    state: AtomicU8,
}

impl Default for DriverCell {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverCell {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(DriverState::Inert as u8),
        }
    }

    /// The current state.
    pub fn state(&self) -> DriverState {
        DriverState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether a task exists in any form.
    pub fn is_running(&self) -> bool {
        !matches!(self.state(), DriverState::Inert)
    }

    /// Claim `Inert -> Starting`. Exactly one caller wins.
    pub fn begin_start(&self) -> bool {
        self.transition(DriverState::Inert, DriverState::Starting)
    }

    /// Confirm `Starting -> Active`.
    pub fn confirm_active(&self) -> bool {
        self.transition(DriverState::Starting, DriverState::Active)
    }

    /// Claim `Active -> Stopping`. Exactly one caller wins.
    pub fn begin_stop(&self) -> bool {
        self.transition(DriverState::Active, DriverState::Stopping)
    }

    /// Confirm `Stopping -> Inert`.
    pub fn confirm_inert(&self) -> bool {
        self.transition(DriverState::Stopping, DriverState::Inert)
    }

    fn transition(&self, from: DriverState, to: DriverState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Owns the background task of one driver: its state cell, its cancellation
/// token, and its join handle.
pub struct DriverHandle {
    cell: DriverCell,
    inner: Mutex<TaskSlot>,
}

#[derive(Default)]
struct TaskSlot {
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl Default for DriverHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverHandle {
    pub fn new() -> Self {
        Self {
            cell: DriverCell::new(),
            inner: Mutex::new(TaskSlot::default()),
        }
    }

    /// Whether this driver has a task (starting, active, or stopping).
    pub fn is_running(&self) -> bool {
        self.cell.is_running()
    }

    /// Start the driver if it is inert. `spawn` receives a fresh
    /// cancellation token and must return the spawned task's handle.
    ///
    /// Idempotent: a second start while a task exists is a no-op and
    /// returns `false`. The spawn itself completes synchronously, so a
    /// caller that registers a listener before calling this can never miss
    /// an event.
    pub fn start<F>(&self, spawn: F) -> bool
    where
        F: FnOnce(CancellationToken) -> JoinHandle<()>,
    {
        if !self.cell.begin_start() {
            return false;
        }
        let token = CancellationToken::new();
        let task = spawn(token.clone());
        {
            let mut slot = self.inner.lock().expect("driver task slot poisoned");
            slot.cancel = Some(token);
            slot.task = Some(task);
        }
        self.cell.confirm_active();
        true
    }

    /// Stop the driver and wait for its task to wind down.
    ///
    /// After this returns, no new tick of the driver loop can start. A tick
    /// already past its cancellation check finishes (and may still emit)
    /// before the task exits, which this method waits for. Idempotent.
    pub async fn stop(&self) -> bool {
        if !self.cell.begin_stop() {
            return false;
        }
        let (cancel, task) = {
            let mut slot = self.inner.lock().expect("driver task slot poisoned");
            (slot.cancel.take(), slot.task.take())
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(task) = task {
            let _ = task.await;
        }
        self.cell.confirm_inert();
        true
    }
}
