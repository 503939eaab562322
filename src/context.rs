//! Wiring of the client core around one configuration.

use std::sync::Arc;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::config::Config;
use crate::confirmer::TimedSelectionConfirmer;
use crate::error::ApiError;
use crate::lead_import::LeadImport;
use crate::models::LeadCandidate;
use crate::poller::{NotificationPoller, NotificationService, PollerHandle, PollerState};
use crate::toast::ToastCenter;

/// Root-scope owner of the client core.
///
/// Built once at startup; [`shutdown`](Self::shutdown) stops the poller,
/// discards open selection sessions and cancels toast timers so nothing
/// fires afterwards.
pub struct AppContext {
    config: Config,
    api: ApiClient,
    toasts: ToastCenter,
    poller: NotificationPoller,
    polling: Option<PollerHandle>,
    confirmers: Vec<TimedSelectionConfirmer<LeadCandidate>>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let api = ApiClient::from_config(&config)?;
        let service: Arc<dyn NotificationService> = Arc::new(api.clone());
        Ok(Self::with_notifications(config, api, service))
    }

    /// Build a context whose poller reads from `service` instead of `api`.
    pub fn with_notifications(
        config: Config,
        api: ApiClient,
        service: Arc<dyn NotificationService>,
    ) -> Self {
        let toasts = ToastCenter::new(config.toast_duration());
        let poller =
            NotificationPoller::new(service, toasts.clone()).interval(config.poll_interval());
        Self {
            config,
            api,
            toasts,
            poller,
            polling: None,
            confirmers: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn toasts(&self) -> &ToastCenter {
        &self.toasts
    }

    /// Start the notification poller. Returns `false` if it is already
    /// running.
    pub fn start_polling(&mut self) -> bool {
        if self.polling.is_some() {
            return false;
        }
        info!(base_url = %self.api.base_url(), "starting notification polling");
        self.polling = Some(self.poller.start());
        true
    }

    pub fn poller_state(&self) -> Option<PollerState> {
        self.polling.as_ref().map(PollerHandle::state)
    }

    /// A confirmer that imports curated leads through the API and reports
    /// the outcome as toasts.
    ///
    /// The context keeps each confirmer until it is idle and every other
    /// handle is gone, so a running countdown survives its caller.
    pub fn lead_confirmer(&mut self) -> TimedSelectionConfirmer<LeadCandidate> {
        self.confirmers.retain(|c| !c.is_orphaned());
        let target = Arc::new(LeadImport::new(self.api.clone(), self.toasts.clone()));
        let confirmer: TimedSelectionConfirmer<LeadCandidate> =
            TimedSelectionConfirmer::with_countdown(target, self.config.countdown_seconds);
        self.confirmers.push(confirmer.clone());
        confirmer
    }

    pub async fn shutdown(mut self) {
        if let Some(handle) = self.polling.take() {
            handle.stop().await;
        }
        for confirmer in self.confirmers.drain(..) {
            confirmer.shutdown();
        }
        self.toasts.shutdown();
        debug!("application context shut down");
    }
}
