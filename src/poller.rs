//! Background bridge from the notification feed to the [`ToastCenter`].
//!
//! The poller runs one cycle immediately when started and then one cycle per
//! interval, measured from the moment the previous cycle settled. Cycles
//! never overlap. Failures are logged and swallowed: a failed fetch skips the
//! cycle, a failed acknowledgment leaves the toast up and moves on.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::{Notification, NotificationId};
use crate::task_guard::TaskGuard;
use crate::toast::{ToastCenter, ToastKind};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// Source of unread notifications.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Fetch notifications that have not been read yet.
    async fn fetch_unread(&self) -> anyhow::Result<Vec<Notification>>;

    /// Mark a notification as read. Must tolerate repeats.
    async fn acknowledge_read(&self, id: &NotificationId) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Waiting for the next cycle.
    Idle,
    /// A fetch-and-acknowledge cycle is in progress.
    Polling,
    /// Torn down; no further fetches happen.
    Stopped,
}

/// Outcome of a single poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetch_failed: bool,
    pub shown: usize,
    pub acknowledged: usize,
    pub ack_failures: usize,
}

#[derive(Clone)]
pub struct NotificationPoller {
    service: Arc<dyn NotificationService>,
    toasts: ToastCenter,
    interval: Duration,
}

impl NotificationPoller {
    pub fn new(service: Arc<dyn NotificationService>, toasts: ToastCenter) -> Self {
        Self {
            service,
            toasts,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the delay between the end of one cycle and the start of the next.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one cycle: fetch unread notifications, toast and acknowledge each.
    ///
    /// Nothing is applied once `cancel` fires.
    pub async fn poll_once(&self, cancel: &CancellationToken) -> CycleReport {
        let mut report = CycleReport::default();
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return report,
            res = self.service.fetch_unread() => res,
        };
        let batch = match fetched {
            Ok(batch) => batch,
            Err(e) => {
                debug!(error = %e, "notification fetch failed, skipping cycle");
                report.fetch_failed = true;
                return report;
            }
        };

        let mut delivered = HashSet::new();
        for notification in batch {
            if cancel.is_cancelled() {
                break;
            }
            if !delivered.insert(notification.id.clone()) {
                debug!(id = %notification.id, "duplicate notification in batch");
                continue;
            }
            self.toasts
                .add_toast(notification.display_message(), ToastKind::Info);
            report.shown += 1;
            match self.service.acknowledge_read(&notification.id).await {
                Ok(()) => report.acknowledged += 1,
                Err(e) => {
                    warn!(id = %notification.id, error = %e, "failed to acknowledge notification");
                    report.ack_failures += 1;
                }
            }
        }
        report
    }

    /// Start polling in the background.
    ///
    /// The returned handle stops the loop on [`PollerHandle::stop`] or when it
    /// is dropped.
    pub fn start(&self) -> PollerHandle {
        let cancel = CancellationToken::new();
        let state = Arc::new(watch::channel(PollerState::Idle).0);
        let task = TaskGuard::spawn(run(self.clone(), cancel.clone(), state.clone()));
        PollerHandle {
            cancel,
            state,
            task: Some(task),
        }
    }
}

async fn run(
    poller: NotificationPoller,
    cancel: CancellationToken,
    state: Arc<watch::Sender<PollerState>>,
) {
    debug!(interval = ?poller.interval, "notification poller started");
    loop {
        state.send_replace(PollerState::Polling);
        let report = poller.poll_once(&cancel).await;
        if cancel.is_cancelled() {
            break;
        }
        debug!(?report, "poll cycle settled");
        state.send_replace(PollerState::Idle);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(poller.interval) => {}
        }
    }
    state.send_replace(PollerState::Stopped);
    debug!("notification poller stopped");
}

/// Running poller. Dropping it aborts the loop.
pub struct PollerHandle {
    cancel: CancellationToken,
    state: Arc<watch::Sender<PollerState>>,
    task: Option<TaskGuard>,
}

impl PollerHandle {
    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<PollerState> {
        self.state.subscribe()
    }

    /// Cancel the pending timer and wait for the loop to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.task.take().and_then(TaskGuard::detach) {
            let _ = handle.await;
        }
        self.state.send_replace(PollerState::Stopped);
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationPayload;
    use std::sync::Mutex;

    struct Scripted {
        batch: Vec<Notification>,
        acks: Mutex<Vec<NotificationId>>,
    }

    #[async_trait]
    impl NotificationService for Scripted {
        async fn fetch_unread(&self) -> anyhow::Result<Vec<Notification>> {
            Ok(self.batch.clone())
        }

        async fn acknowledge_read(&self, id: &NotificationId) -> anyhow::Result<()> {
            self.acks.lock().unwrap().push(id.clone());
            Ok(())
        }
    }

    fn notification(id: i64, message: Option<&str>) -> Notification {
        Notification {
            id: id.into(),
            payload: NotificationPayload {
                message: message.map(str::to_string),
                ..Default::default()
            },
            read: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_cycle_applies_nothing() {
        let service = Arc::new(Scripted {
            batch: vec![notification(1, Some("hi"))],
            acks: Mutex::new(Vec::new()),
        });
        let toasts = ToastCenter::default();
        let poller = NotificationPoller::new(service.clone(), toasts.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = poller.poll_once(&cancel).await;
        assert_eq!(report, CycleReport::default());
        assert!(toasts.is_empty());
        assert!(service.acks.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_ids_are_delivered_once() {
        let service = Arc::new(Scripted {
            batch: vec![
                notification(4, Some("Reply from Jo")),
                notification(4, Some("Reply from Jo")),
                notification(5, None),
            ],
            acks: Mutex::new(Vec::new()),
        });
        let toasts = ToastCenter::default();
        let poller = NotificationPoller::new(service.clone(), toasts.clone());

        let report = poller.poll_once(&CancellationToken::new()).await;
        assert_eq!(report.shown, 2);
        assert_eq!(report.acknowledged, 2);
        assert_eq!(
            *service.acks.lock().unwrap(),
            vec![NotificationId::Number(4), NotificationId::Number(5)]
        );
        let messages: Vec<_> = toasts.snapshot().into_iter().map(|t| t.message).collect();
        assert_eq!(messages, vec!["Notification", "Reply from Jo"]);
    }
}
