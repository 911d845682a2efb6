//! Cloud sync dispatch: mirrors batches and call events to a remote store.
//! Fire-and-forget: every event is POSTed from its own tokio task; failures
//! are logged and forwarded on a channel, never returned to the scheduler.

use std::time::Duration;

use autodial_core::config::SyncConfig;
use autodial_core::{Batch, CallEntry, CloudSync};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// HTTP webhook target.
#[derive(Debug, Clone)]
pub struct WebhookTarget {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl WebhookTarget {
    /// Build a target from the `[sync]` config section. None when sync is
    /// disabled or no URL is set.
    pub fn from_config(config: &SyncConfig) -> Option<Self> {
        if !config.enabled || config.webhook_url.trim().is_empty() {
            return None;
        }
        Some(Self {
            url: config.webhook_url.clone(),
            headers: config.headers.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        })
    }
}

/// Cloud sync over an HTTP webhook. Must be used inside a tokio runtime.
pub struct WebhookSync {
    client: reqwest::Client,
    target: WebhookTarget,
    failures: mpsc::UnboundedSender<String>,
}

impl WebhookSync {
    /// Returns the adapter and the receiver its failures are reported on.
    pub fn new(target: WebhookTarget) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (failures, rx) = mpsc::unbounded_channel();
        let sync = Self {
            client: reqwest::Client::new(),
            target,
            failures,
        };
        (sync, rx)
    }

    fn post(&self, kind: &'static str, body: serde_json::Value) {
        let client = self.client.clone();
        let target = self.target.clone();
        let failures = self.failures.clone();
        tokio::spawn(async move {
            if let Err(e) = send_webhook(&client, &target, &body).await {
                tracing::warn!("⚠️ Sync of {kind} failed: {e}");
                let _ = failures.send(e);
            }
        });
    }
}

impl CloudSync for WebhookSync {
    fn sync_batch(&self, batch: &Batch) {
        self.post("batch", batch_payload(batch));
    }

    fn sync_call_event(&self, entry: &CallEntry, at: DateTime<Utc>) {
        self.post("call event", call_event_payload(entry, at));
    }
}

/// Used when sync is disabled.
pub struct NoopSync;

impl CloudSync for NoopSync {
    fn sync_batch(&self, batch: &Batch) {
        tracing::debug!("☁️ Sync disabled, batch '{}' kept local", batch.id);
    }

    fn sync_call_event(&self, _entry: &CallEntry, _at: DateTime<Utc>) {}
}

fn batch_payload(batch: &Batch) -> serde_json::Value {
    serde_json::json!({
        "type": "batch",
        "batch_id": batch.id,
        "total_imported": batch.total_imported,
        "imported_at": batch.imported_at.to_rfc3339(),
    })
}

fn call_event_payload(entry: &CallEntry, at: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "type": "call_event",
        "batch_id": entry.batch_id,
        "number": entry.number,
        "outcome": entry.outcome,
        "remark": entry.remark,
        "timestamp": at.to_rfc3339(),
    })
}

/// POST a JSON body to the webhook.
async fn send_webhook(
    client: &reqwest::Client,
    target: &WebhookTarget,
    body: &serde_json::Value,
) -> Result<(), String> {
    let mut req = client.post(&target.url).json(body).timeout(target.timeout);
    for (key, value) in &target.headers {
        req = req.header(key.as_str(), value.as_str());
    }

    let resp = req
        .send()
        .await
        .map_err(|e| format!("Webhook send failed: {e}"))?;

    if resp.status().is_success() {
        tracing::debug!("☁️ Synced to {}", target.url);
        Ok(())
    } else {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(format!("Webhook error {status}: {body}"))
    }
}
