//! Scheduled task handle for the tick loop

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Owns a background task and cancels it on request or on drop.
///
/// Cancelling is idempotent.
#[derive(Debug)]
pub struct TickHandle {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TickHandle {
    /// Take ownership of a running task
    pub fn new(task: JoinHandle<()>) -> Self {
        Self {
            task: Mutex::new(Some(task)),
        }
    }

    /// Stop the task if it is still scheduled
    pub fn cancel(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    /// Whether the task is still scheduled
    pub fn is_active(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
