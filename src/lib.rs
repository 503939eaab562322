//! Client-side runtime core for the lead outreach application.
//!
//! Three small components carry the time-dependent behaviour of the UI:
//!
//! - [`ToastCenter`] keeps transient messages and expires them.
//! - [`NotificationPoller`] turns the server's unread notifications into
//!   toasts and acknowledges them, one cycle at a time.
//! - [`TimedSelectionConfirmer`] gives the user a countdown to curate a batch
//!   of imported candidates before it is committed.
//!
//! [`AppContext`] wires them to the REST API through [`ApiClient`] and tears
//! them down together.

mod api;
mod config;
mod confirmer;
mod context;
mod error;
mod lead_import;
mod models;
mod poller;
mod shutdown;
mod task_guard;
mod toast;

pub use api::ApiClient;
pub use config::{Config, ConfigError};
pub use confirmer::{
    CommitTarget, DEFAULT_COUNTDOWN_SECONDS, Resolution, SessionEvent, SessionSnapshot,
    TimedSelectionConfirmer,
};
pub use context::AppContext;
pub use error::ApiError;
pub use lead_import::LeadImport;
pub use models::{
    BulkCreated, FALLBACK_NOTIFICATION_MESSAGE, LeadCandidate, Notification, NotificationId,
    NotificationPayload,
};
pub use poller::{
    CycleReport, DEFAULT_POLL_INTERVAL, NotificationPoller, NotificationService, PollerHandle,
    PollerState,
};
pub use shutdown::shutdown_requested;
pub use toast::{DEFAULT_TOAST_DURATION, Subscription, Toast, ToastCenter, ToastId, ToastKind};
