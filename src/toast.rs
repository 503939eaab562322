//! Transient user-facing messages with automatic expiry.
//!
//! A [`ToastCenter`] keeps the list of visible toasts (most recent first),
//! removes each one after a fixed display duration unless it was dismissed
//! earlier, and notifies subscribers on every change.
//!
//! ```no_run
//! # async fn example() {
//! use leadflow::{ToastCenter, ToastKind};
//! let toasts = ToastCenter::default();
//! let _sub = toasts.subscribe(|list| println!("{} toast(s) visible", list.len()));
//! let id = toasts.add_toast("Lead saved", ToastKind::Success);
//! toasts.dismiss(id);
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use crate::task_guard::TaskGuard;

/// How long a toast stays up when nobody dismisses it.
pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(4_500);

static NEXT_TOAST_SEQ: AtomicU64 = AtomicU64::new(1);

/// Severity of a toast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Error,
    Warning,
}

impl ToastKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ToastKind::Info => "info",
            ToastKind::Success => "success",
            ToastKind::Error => "error",
            ToastKind::Warning => "warning",
        }
    }
}

impl fmt::Display for ToastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized names map to [`ToastKind::Info`].
impl FromStr for ToastKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "success" => ToastKind::Success,
            "error" => ToastKind::Error,
            "warning" | "warn" => ToastKind::Warning,
            _ => ToastKind::Info,
        })
    }
}

/// Process-unique toast identifier: a sequence number plus a random suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToastId {
    seq: u64,
    nonce: u32,
}

impl ToastId {
    fn next() -> Self {
        Self {
            seq: NEXT_TOAST_SEQ.fetch_add(1, Ordering::Relaxed),
            nonce: rand::random(),
        }
    }
}

impl fmt::Display for ToastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:08x}", self.seq, self.nonce)
    }
}

impl Serialize for ToastId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: ToastId,
    pub kind: ToastKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

type Listener = Arc<dyn Fn(&[Toast]) + Send + Sync>;

#[derive(Default)]
struct State {
    toasts: Vec<Toast>,
    timers: HashMap<ToastId, TaskGuard>,
    closed: bool,
    /// Bumped on every change to `toasts`.
    version: u64,
}

struct Shared {
    state: Mutex<State>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
    /// Version of the last list handed to listeners. Held while delivering.
    delivered: Mutex<u64>,
    runtime: Option<Handle>,
    duration: Duration,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver the current list. Deliveries are serialized and a list older
    /// than the last one delivered is dropped, so the final list a listener
    /// sees always matches the state.
    fn publish(&self) {
        let mut delivered = self.delivered.lock().unwrap_or_else(|e| e.into_inner());
        let (version, snapshot) = {
            let st = self.state();
            (st.version, st.toasts.clone())
        };
        if version <= *delivered {
            return;
        }
        *delivered = version;
        let listeners: Vec<Listener> = self.listeners().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }

    /// Timer path: the calling task is the guarded one, so detach rather than
    /// abort it.
    fn expire(&self, id: ToastId) {
        let removed = {
            let mut st = self.state();
            if let Some(guard) = st.timers.remove(&id) {
                guard.detach();
            }
            remove_toast(&mut st, id)
        };
        if removed {
            trace!(%id, "toast expired");
            self.publish();
        }
    }
}

fn remove_toast(st: &mut State, id: ToastId) -> bool {
    match st.toasts.iter().position(|t| t.id == id) {
        Some(pos) => {
            st.toasts.remove(pos);
            st.version += 1;
            true
        }
        None => false,
    }
}

/// Registry of visible toasts. Cheap to clone; clones share state.
///
/// Expiry timers run on the tokio runtime that was current when the center
/// was built, or on the caller's runtime otherwise. A toast added with no
/// runtime at all is kept until dismissed.
///
/// Listeners must not call back into the center; deliveries are serialized.
#[derive(Clone)]
pub struct ToastCenter {
    shared: Arc<Shared>,
}

impl Default for ToastCenter {
    fn default() -> Self {
        Self::new(DEFAULT_TOAST_DURATION)
    }
}

impl ToastCenter {
    pub fn new(duration: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
                delivered: Mutex::new(0),
                runtime: Handle::try_current().ok(),
                duration,
            }),
        }
    }

    pub fn duration(&self) -> Duration {
        self.shared.duration
    }

    /// Show a message and schedule its removal. Never blocks.
    pub fn add_toast(&self, message: impl Into<String>, kind: ToastKind) -> ToastId {
        let toast = Toast {
            id: ToastId::next(),
            kind,
            message: message.into(),
            created_at: Utc::now(),
        };
        let id = toast.id;
        {
            let mut st = self.shared.state();
            if st.closed {
                debug!(%id, "toast center shut down, dropping toast");
                return id;
            }
            debug!(%id, %kind, message = %toast.message, "toast added");
            st.toasts.insert(0, toast);
            st.version += 1;
            let runtime = self
                .shared
                .runtime
                .clone()
                .or_else(|| Handle::try_current().ok());
            match runtime {
                Some(runtime) => {
                    let weak: Weak<Shared> = Arc::downgrade(&self.shared);
                    let duration = self.shared.duration;
                    let timer = TaskGuard::spawn_on(&runtime, async move {
                        tokio::time::sleep(duration).await;
                        if let Some(shared) = weak.upgrade() {
                            shared.expire(id);
                        }
                    });
                    st.timers.insert(id, timer);
                }
                None => warn!(%id, "no tokio runtime, toast will not expire"),
            }
        }
        self.shared.publish();
        id
    }

    pub fn info(&self, message: impl Into<String>) -> ToastId {
        self.add_toast(message, ToastKind::Info)
    }

    pub fn success(&self, message: impl Into<String>) -> ToastId {
        self.add_toast(message, ToastKind::Success)
    }

    pub fn error(&self, message: impl Into<String>) -> ToastId {
        self.add_toast(message, ToastKind::Error)
    }

    pub fn warning(&self, message: impl Into<String>) -> ToastId {
        self.add_toast(message, ToastKind::Warning)
    }

    /// Remove a toast now. Returns `false` if it was already gone.
    pub fn dismiss(&self, id: ToastId) -> bool {
        let removed = {
            let mut st = self.shared.state();
            st.timers.remove(&id);
            remove_toast(&mut st, id)
        };
        if removed {
            trace!(%id, "toast dismissed");
            self.shared.publish();
        }
        removed
    }

    /// Visible toasts, most recent first.
    pub fn snapshot(&self) -> Vec<Toast> {
        self.shared.state().toasts.clone()
    }

    pub fn len(&self) -> usize {
        self.shared.state().toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call `listener` with the full list after every change.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::unsubscribe`] is called.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[Toast]) + Send + Sync + 'static,
    {
        let id = self.shared.next_listener.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(listener);
        self.shared.listeners().push((id, listener));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Cancel every pending expiry and clear the list.
    ///
    /// Later calls to [`add_toast`](Self::add_toast) are ignored.
    pub fn shutdown(&self) {
        let had_toasts = {
            let mut st = self.shared.state();
            st.closed = true;
            st.timers.clear();
            let had = !st.toasts.is_empty();
            if had {
                st.toasts.clear();
                st.version += 1;
            }
            had
        };
        if had_toasts {
            self.shared.publish();
        }
    }
}

/// Handle returned by [`ToastCenter::subscribe`].
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.listeners().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::time::sleep;

    fn recorder(center: &ToastCenter) -> (Subscription, Arc<Mutex<Vec<usize>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = center.subscribe(move |list| sink.lock().unwrap().push(list.len()));
        (sub, seen)
    }

    #[tokio::test(start_paused = true)]
    async fn toast_expires_after_duration() {
        let center = ToastCenter::default();
        let (_sub, seen) = recorder(&center);
        let id = center.info("Reminder: call Acme");

        sleep(Duration::from_millis(4_400)).await;
        assert_eq!(center.snapshot()[0].id, id);

        sleep(Duration::from_millis(200)).await;
        assert!(center.is_empty());
        assert_eq!(*seen.lock().unwrap(), vec![1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn newest_toast_comes_first() {
        let center = ToastCenter::default();
        center.info("first");
        center.error("second");
        let list = center.snapshot();
        assert_eq!(list[0].message, "second");
        assert_eq!(list[0].kind, ToastKind::Error);
        assert_eq!(list[1].message, "first");
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_is_idempotent() {
        // Given a visible toast
        let center = ToastCenter::default();
        let (_sub, seen) = recorder(&center);
        let id = center.success("Saved");

        // When it is dismissed twice
        assert!(center.dismiss(id));
        assert!(!center.dismiss(id));

        // Then the cancelled expiry publishes nothing later
        sleep(Duration::from_secs(10)).await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_after_expiry_is_a_noop() {
        let center = ToastCenter::default();
        let (_sub, seen) = recorder(&center);
        let id = center.warning("Quota low");
        sleep(Duration::from_secs(5)).await;

        assert!(!center.dismiss(id));
        assert_eq!(*seen.lock().unwrap(), vec![1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn each_toast_expires_independently() {
        let center = ToastCenter::default();
        center.info("a");
        sleep(Duration::from_secs(2)).await;
        center.info("b");

        sleep(Duration::from_millis(2_600)).await;
        let left: Vec<_> = center.snapshot().into_iter().map(|t| t.message).collect();
        assert_eq!(left, vec!["b".to_string()]);

        sleep(Duration::from_secs(2)).await;
        assert!(center.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_stops_notifications() {
        let center = ToastCenter::default();
        let (sub, seen) = recorder(&center);
        center.info("one");
        sub.unsubscribe();
        center.info("two");
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_expiry() {
        let center = ToastCenter::default();
        center.info("one");
        center.info("two");
        let (_sub, seen) = recorder(&center);

        center.shutdown();
        center.info("ignored");
        sleep(Duration::from_secs(10)).await;

        assert!(center.is_empty());
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn ids_are_unique_under_concurrent_creation() {
        let center = ToastCenter::new(Duration::from_secs(60));
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let center = center.clone();
            tasks.push(tokio::spawn(async move {
                (0..100).map(|i| center.info(format!("{i}"))).collect::<Vec<_>>()
            }));
        }
        let mut ids = HashSet::new();
        for task in tasks {
            for id in task.await.unwrap() {
                assert!(ids.insert(id), "duplicate toast id {id}");
            }
        }
        assert_eq!(ids.len(), 800);
        center.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn last_delivered_list_matches_state_under_contention() {
        for _ in 0..50 {
            // Given a slow listener on a center mutated from many workers
            let center = ToastCenter::new(Duration::from_secs(60));
            let last = Arc::new(Mutex::new(None::<usize>));
            let sink = last.clone();
            let _sub = center.subscribe(move |list| {
                let len = list.len();
                std::thread::sleep(Duration::from_micros(u64::from(rand::random::<u8>() % 100)));
                *sink.lock().unwrap() = Some(len);
            });

            // When every worker adds and dismisses concurrently
            let mut tasks = Vec::new();
            for _ in 0..8 {
                let center = center.clone();
                tasks.push(tokio::spawn(async move {
                    for i in 0..20 {
                        let id = center.info(format!("{i}"));
                        if i % 2 == 0 {
                            center.dismiss(id);
                        }
                    }
                }));
            }
            for task in tasks {
                task.await.unwrap();
            }

            // Then the final delivery reflects the final state
            assert_eq!(*last.lock().unwrap(), Some(center.len()));
            center.shutdown();
        }
    }

    #[test]
    fn adding_without_a_runtime_does_not_panic() {
        let center = ToastCenter::new(Duration::from_millis(10));
        let id = center.info("offline");
        assert_eq!(center.snapshot()[0].id, id);
        assert!(center.dismiss(id));
    }

    #[test]
    fn expiry_runs_on_the_runtime_the_center_was_built_in() {
        // Given a center built inside a runtime
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let center = rt.block_on(async { ToastCenter::new(Duration::from_millis(10)) });

        // When a toast is added from outside that runtime
        center.info("from a plain thread");
        assert_eq!(center.len(), 1);

        // Then the runtime still expires it
        rt.block_on(async { tokio::time::sleep(Duration::from_millis(100)).await });
        assert!(center.is_empty());
    }

    #[test]
    fn unknown_kind_falls_back_to_info() {
        assert_eq!("success".parse::<ToastKind>().unwrap(), ToastKind::Success);
        assert_eq!("WARNING".parse::<ToastKind>().unwrap(), ToastKind::Warning);
        assert_eq!("shout".parse::<ToastKind>().unwrap(), ToastKind::Info);
    }
}
