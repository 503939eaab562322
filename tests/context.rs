use async_trait::async_trait;
use leadflow::{
    ApiClient, AppContext, Config, LeadCandidate, Notification, NotificationId, NotificationService,
    PollerState,
};
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Default)]
struct CountingFeed {
    fetches: AtomicUsize,
    acks: Mutex<Vec<NotificationId>>,
}

#[async_trait]
impl NotificationService for CountingFeed {
    async fn fetch_unread(&self) -> anyhow::Result<Vec<Notification>> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) as i64;
        Ok(vec![serde_json::from_value(json!({
            "id": n,
            "payload": {"message": format!("reminder {n}")}
        }))?])
    }

    async fn acknowledge_read(&self, id: &NotificationId) -> anyhow::Result<()> {
        self.acks.lock().unwrap().push(id.clone());
        Ok(())
    }
}

fn config(base_url: String) -> Config {
    Config {
        base_url,
        ..Config::default()
    }
}

#[tokio::test(start_paused = true)]
async fn context_polls_until_shutdown() {
    let cfg = config("http://127.0.0.1:9/api".into());
    let api = ApiClient::from_config(&cfg).unwrap();
    let feed = Arc::new(CountingFeed::default());
    let mut ctx = AppContext::with_notifications(cfg, api, feed.clone());

    assert_eq!(ctx.poller_state(), None);
    assert!(ctx.start_polling());
    assert!(!ctx.start_polling());

    sleep(Duration::from_millis(1)).await;
    assert_eq!(ctx.toasts().snapshot()[0].message, "reminder 0");
    assert_eq!(ctx.poller_state(), Some(PollerState::Idle));

    // the toast expires on the configured display duration
    sleep(Duration::from_millis(4_600)).await;
    assert!(ctx.toasts().is_empty());

    sleep(Duration::from_secs(16)).await;
    assert_eq!(feed.fetches.load(Ordering::SeqCst), 2);

    let toasts = ctx.toasts().clone();
    ctx.shutdown().await;
    assert!(toasts.is_empty());

    sleep(Duration::from_secs(120)).await;
    assert_eq!(feed.fetches.load(Ordering::SeqCst), 2);
    assert_eq!(feed.acks.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn lead_confirmer_imports_through_the_api() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/leads/bulk");
            then.status(200).json_body(json!({"ids": [1, 2]}));
        })
        .await;

    let cfg = Config {
        countdown_seconds: 1,
        ..config(server.url("/api"))
    };
    let mut ctx = AppContext::new(cfg).unwrap();
    let confirmer = ctx.lead_confirmer();
    let mut events = confirmer.subscribe();

    let leads: Vec<LeadCandidate> = serde_json::from_value(json!([
        {"name": "Jo Park", "email": "jo@example.com"},
        {"company": "Globex"}
    ]))
    .unwrap();
    assert!(confirmer.start(leads));

    // Started, then the commit once the one-second countdown expires
    loop {
        match events.recv().await.unwrap() {
            leadflow::SessionEvent::Committed { count, .. } => {
                assert_eq!(count, 2);
                break;
            }
            leadflow::SessionEvent::CommitFailed { error, .. } => panic!("{error}"),
            _ => {}
        }
    }
    mock.assert_async().await;
    assert_eq!(ctx.toasts().snapshot()[0].message, "Imported 2 leads");
    ctx.shutdown().await;
}
