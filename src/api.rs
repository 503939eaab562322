//! JSON-over-HTTP client for the lead management API.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{BulkCreated, LeadCandidate, Notification, NotificationId};
use crate::poller::NotificationService;

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(serde::Serialize)]
struct BulkRequest<'a> {
    leads: &'a [LeadCandidate],
}

/// Thin typed wrapper over the REST endpoints the core consumes.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` whose requests give up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::BaseUrl(base_url));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::Transport {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ApiError> {
        Self::new(cfg.base_url.clone(), cfg.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(&self, req: RequestBuilder, url: &str) -> Result<Response, ApiError> {
        let resp = req.send().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        let status = resp.status();
        trace!(%url, %status, "api response");
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|b| b.error)
            .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_string()))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
        Err(ApiError::Status {
            url: url.to_string(),
            status,
            message,
        })
    }

    async fn json<T: DeserializeOwned>(&self, req: RequestBuilder, url: &str) -> Result<T, ApiError> {
        let resp = self.execute(req, url).await?;
        resp.json().await.map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// `GET /notifications?unread=true`
    pub async fn fetch_unread_notifications(&self) -> Result<Vec<Notification>, ApiError> {
        let url = self.url("/notifications?unread=true");
        let batch: Vec<Notification> = self.json(self.http.get(&url), &url).await?;
        debug!(count = batch.len(), "fetched unread notifications");
        Ok(batch)
    }

    /// `POST /notifications/{id}/read`. The server treats repeats as no-ops.
    pub async fn mark_notification_read(&self, id: &NotificationId) -> Result<(), ApiError> {
        let path = format!("/notifications/{}/read", urlencoding::encode(&id.to_string()));
        let url = self.url(&path);
        self.execute(self.http.post(&url), &url).await?;
        Ok(())
    }

    /// `POST /leads` with a single lead.
    pub async fn create_lead(&self, lead: &LeadCandidate) -> Result<BulkCreated, ApiError> {
        let url = self.url("/leads");
        self.json(self.http.post(&url).json(lead), &url).await
    }

    /// `POST /leads/bulk` with `{ "leads": [...] }`.
    pub async fn create_leads_bulk(&self, leads: &[LeadCandidate]) -> Result<BulkCreated, ApiError> {
        let url = self.url("/leads/bulk");
        self.json(self.http.post(&url).json(&BulkRequest { leads }), &url)
            .await
    }
}

#[async_trait]
impl NotificationService for ApiClient {
    async fn fetch_unread(&self) -> anyhow::Result<Vec<Notification>> {
        Ok(self.fetch_unread_notifications().await?)
    }

    async fn acknowledge_read(&self, id: &NotificationId) -> anyhow::Result<()> {
        Ok(self.mark_notification_read(id).await?)
    }
}
