//! Countdown-driven curation of imported candidates.
//!
//! After a bulk search returns candidates the user gets a fixed number of
//! seconds to pick the ones worth keeping. The session then resolves exactly
//! once, in one of four ways:
//!
//! | trigger             | selection | result                      |
//! |---------------------|-----------|-----------------------------|
//! | countdown hits zero | empty     | commit every candidate      |
//! | countdown hits zero | non-empty | commit the selected ones    |
//! | manual confirm      | non-empty | commit the selected ones    |
//! | manual confirm      | empty     | cancel, nothing committed   |
//! | manual cancel       | any       | cancel, nothing committed   |
//!
//! An empty selection means "everything" on expiry but "nothing" on manual
//! confirmation. Callers that confirm with nothing selected are expected to
//! have asked the user first.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::task_guard::TaskGuard;

pub const DEFAULT_COUNTDOWN_SECONDS: u32 = 60;

const TICK: Duration = Duration::from_secs(1);

/// Persists the candidates a session resolved to.
#[async_trait]
pub trait CommitTarget<T>: Send + Sync {
    async fn commit(&self, items: Vec<T>) -> anyhow::Result<()>;
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    AutoCommitAll,
    AutoCommitSelected,
    ManualCommitSelected,
    Cancelled,
}

impl Resolution {
    pub fn is_commit(self) -> bool {
        !matches!(self, Resolution::Cancelled)
    }
}

/// Broadcast to [`TimedSelectionConfirmer::subscribe`] receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started {
        session: u64,
        candidates: usize,
        remaining_seconds: u32,
    },
    Tick {
        session: u64,
        remaining_seconds: u32,
    },
    Committed {
        session: u64,
        resolution: Resolution,
        count: usize,
    },
    CommitFailed {
        session: u64,
        resolution: Resolution,
        error: String,
    },
    /// Cancelled by the user, by an empty manual confirm, or superseded by a
    /// newer session.
    Cancelled { session: u64 },
}

/// Point-in-time view of the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot<T> {
    pub candidates: Vec<T>,
    pub selected: BTreeSet<usize>,
    pub remaining_seconds: u32,
    pub active: bool,
}

impl<T> Default for SessionSnapshot<T> {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            selected: BTreeSet::new(),
            remaining_seconds: 0,
            active: false,
        }
    }
}

struct Session<T> {
    id: u64,
    candidates: Vec<T>,
    selected: BTreeSet<usize>,
    remaining: u32,
    ticker: Option<TaskGuard>,
}

impl<T: Clone> Session<T> {
    fn selected_items(&self) -> Vec<T> {
        self.selected
            .iter()
            .map(|&i| self.candidates[i].clone())
            .collect()
    }
}

struct State<T> {
    session: Option<Session<T>>,
    last_id: u64,
    closed: bool,
}

enum TickOutcome<T> {
    Continue,
    Expired(Resolution, Vec<T>),
    Stale,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    target: Arc<dyn CommitTarget<T>>,
    events: broadcast::Sender<SessionEvent>,
    countdown: u32,
}

impl<T> Shared<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Apply one countdown tick to session `id`. Ticks for a session that is
    /// no longer current are ignored.
    fn tick(&self, id: u64) -> TickOutcome<T> {
        let mut st = self.state();
        let Some(session) = st.session.as_mut().filter(|s| s.id == id) else {
            return TickOutcome::Stale;
        };
        session.remaining = session.remaining.saturating_sub(1);
        if session.remaining > 0 {
            let remaining = session.remaining;
            drop(st);
            self.emit(SessionEvent::Tick {
                session: id,
                remaining_seconds: remaining,
            });
            return TickOutcome::Continue;
        }

        let Some(mut session) = st.session.take() else {
            return TickOutcome::Stale;
        };
        // this runs on the ticker itself
        if let Some(ticker) = session.ticker.take() {
            ticker.detach();
        }
        if session.selected.is_empty() {
            TickOutcome::Expired(Resolution::AutoCommitAll, session.candidates)
        } else {
            let items = session.selected_items();
            TickOutcome::Expired(Resolution::AutoCommitSelected, items)
        }
    }

    async fn commit(&self, id: u64, resolution: Resolution, items: Vec<T>) -> anyhow::Result<()> {
        let count = items.len();
        info!(session = id, ?resolution, count, "committing selection");
        match self.target.commit(items).await {
            Ok(()) => {
                self.emit(SessionEvent::Committed {
                    session: id,
                    resolution,
                    count,
                });
                Ok(())
            }
            Err(e) => {
                warn!(session = id, ?resolution, error = %e, "commit failed");
                self.emit(SessionEvent::CommitFailed {
                    session: id,
                    resolution,
                    error: format!("{e:#}"),
                });
                Err(e)
            }
        }
    }
}

async fn countdown<T>(shared: Weak<Shared<T>>, id: u64)
where
    T: Clone + Send + Sync + 'static,
{
    let mut ticks = tokio::time::interval_at(Instant::now() + TICK, TICK);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticks.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        match shared.tick(id) {
            TickOutcome::Continue => {}
            TickOutcome::Stale => return,
            TickOutcome::Expired(resolution, items) => {
                debug!(session = id, "countdown expired");
                // reported through the event channel
                let _ = shared.commit(id, resolution, items).await;
                return;
            }
        }
    }
}

/// Timed selection workflow over candidates of type `T`.
///
/// Cheap to clone; clones drive the same session. The countdown runs on the
/// ambient tokio runtime.
pub struct TimedSelectionConfirmer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for TimedSelectionConfirmer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> TimedSelectionConfirmer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(target: Arc<dyn CommitTarget<T>>) -> Self {
        Self::with_countdown(target, DEFAULT_COUNTDOWN_SECONDS)
    }

    /// Like [`new`](Self::new) with a custom countdown length (at least one
    /// second).
    pub fn with_countdown(target: Arc<dyn CommitTarget<T>>, seconds: u32) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    session: None,
                    last_id: 0,
                    closed: false,
                }),
                target,
                events,
                countdown: seconds.max(1),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Begin a session over `candidates`, replacing any active one without
    /// committing it. Returns `false` and does nothing for an empty list.
    pub fn start(&self, candidates: Vec<T>) -> bool {
        if candidates.is_empty() {
            debug!("ignoring selection session without candidates");
            return false;
        }
        let mut st = self.shared.state();
        if st.closed {
            return false;
        }
        let superseded = st.session.take().map(|old| old.id);
        st.last_id += 1;
        let id = st.last_id;
        let count = candidates.len();
        st.session = Some(Session {
            id,
            candidates,
            selected: BTreeSet::new(),
            remaining: self.shared.countdown,
            ticker: Some(TaskGuard::spawn(countdown(
                Arc::downgrade(&self.shared),
                id,
            ))),
        });
        drop(st);

        if let Some(old) = superseded {
            debug!(session = old, "selection session superseded");
            self.shared.emit(SessionEvent::Cancelled { session: old });
        }
        info!(session = id, candidates = count, "selection session started");
        self.shared.emit(SessionEvent::Started {
            session: id,
            candidates: count,
            remaining_seconds: self.shared.countdown,
        });
        true
    }

    /// Flip whether candidate `index` is selected.
    ///
    /// Returns `false` without effect when no session is active or `index`
    /// is out of range.
    pub fn toggle(&self, index: usize) -> bool {
        let mut st = self.shared.state();
        let Some(session) = st.session.as_mut() else {
            return false;
        };
        if index >= session.candidates.len() {
            return false;
        }
        if !session.selected.remove(&index) {
            session.selected.insert(index);
        }
        true
    }

    /// Resolve the active session now.
    ///
    /// With a selection, commits exactly the selected candidates and returns
    /// the commit result. With nothing selected, cancels. Returns `Ok(None)`
    /// when there was no active session.
    pub async fn confirm_manually(&self) -> anyhow::Result<Option<Resolution>> {
        let (id, items) = {
            let mut st = self.shared.state();
            let Some(session) = st.session.take() else {
                return Ok(None);
            };
            if session.selected.is_empty() {
                drop(st);
                info!(session = session.id, "empty manual confirmation, cancelling");
                self.shared
                    .emit(SessionEvent::Cancelled { session: session.id });
                return Ok(Some(Resolution::Cancelled));
            }
            (session.id, session.selected_items())
        };
        let resolution = Resolution::ManualCommitSelected;
        self.shared.commit(id, resolution, items).await?;
        Ok(Some(resolution))
    }

    /// Discard the active session without committing. Returns `false` when
    /// there was none.
    pub fn cancel(&self) -> bool {
        let Some(session) = self.shared.state().session.take() else {
            return false;
        };
        info!(session = session.id, "selection session cancelled");
        self.shared
            .emit(SessionEvent::Cancelled { session: session.id });
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot<T> {
        match &self.shared.state().session {
            Some(s) => SessionSnapshot {
                candidates: s.candidates.clone(),
                selected: s.selected.clone(),
                remaining_seconds: s.remaining,
                active: true,
            },
            None => SessionSnapshot::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.state().session.is_some()
    }

    /// True when this is the last handle and no session is running, so
    /// nothing can reach the confirmer any more.
    pub(crate) fn is_orphaned(&self) -> bool {
        Arc::strong_count(&self.shared) == 1 && !self.is_active()
    }

    /// Tear down: drop any active session silently and refuse new ones.
    pub fn shutdown(&self) {
        let mut st = self.shared.state();
        st.closed = true;
        if let Some(session) = st.session.take() {
            debug!(session = session.id, "selection session discarded on shutdown");
        }
    }
}
