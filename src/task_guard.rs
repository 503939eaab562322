use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Owns a spawned timer task and aborts it when dropped.
///
/// Every scheduled effect in this crate (toast expiry, countdown ticks, the
/// poll loop) lives behind one of these, so tearing down the owner cancels
/// the timer without further bookkeeping.
#[derive(Debug)]
pub(crate) struct TaskGuard {
    handle: Option<JoinHandle<()>>,
}

impl TaskGuard {
    pub(crate) fn spawn<F>(fut: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(fut)),
        }
    }

    pub(crate) fn spawn_on<F>(runtime: &Handle, fut: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: Some(runtime.spawn(fut)),
        }
    }

    /// Release the task without aborting it.
    ///
    /// Used by a task that resolves its own owner: dropping the guard from
    /// inside the guarded task would cancel it at its next await point.
    pub(crate) fn detach(mut self) -> Option<JoinHandle<()>> {
        self.handle.take()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
