use std::future::Future;

use tokio::task::JoinHandle;

/// Single-slot timer handle owned by the component that armed it.
///
/// The slot is either idle or holds one pending task. Dropping the slot
/// aborts whatever is still pending.
#[derive(Debug, Default)]
pub struct TimerSlot {
    pending: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Arms the slot unless a task is already pending. Returns whether it armed.
    pub fn arm<F>(&mut self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_pending() {
            return false;
        }
        self.pending = Some(tokio::spawn(task));
        true
    }

    /// Cancels any pending task and arms the slot with `task`.
    pub fn restart<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.pending = Some(tokio::spawn(task));
    }

    /// Forgets the pending handle without aborting it. Called by the task
    /// itself when it fires.
    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
