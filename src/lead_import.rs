//! Persisting curated lead candidates.

use async_trait::async_trait;
use tracing::debug;

use crate::api::ApiClient;
use crate::confirmer::CommitTarget;
use crate::models::LeadCandidate;
use crate::toast::ToastCenter;

/// Commits curated lead candidates to the API and reports the outcome as a
/// toast.
///
/// A single lead goes through `POST /leads`, anything larger through
/// `POST /leads/bulk`.
#[derive(Clone)]
pub struct LeadImport {
    api: ApiClient,
    toasts: ToastCenter,
}

impl LeadImport {
    pub fn new(api: ApiClient, toasts: ToastCenter) -> Self {
        Self { api, toasts }
    }
}

pub(crate) fn imported_message(count: usize) -> String {
    match count {
        1 => "Imported 1 lead".to_string(),
        n => format!("Imported {n} leads"),
    }
}

#[async_trait]
impl CommitTarget<LeadCandidate> for LeadImport {
    async fn commit(&self, items: Vec<LeadCandidate>) -> anyhow::Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let created = match items.as_slice() {
            [single] => self.api.create_lead(single).await,
            many => self.api.create_leads_bulk(many).await,
        };
        match created {
            Ok(created) => {
                let count = if created.ids.is_empty() {
                    items.len()
                } else {
                    created.ids.len()
                };
                debug!(count, "leads imported");
                self.toasts.success(imported_message(count));
                Ok(())
            }
            Err(e) => {
                self.toasts.error(format!("Failed to import leads: {e}"));
                Err(e.into())
            }
        }
    }
}
