//! # Metadata Export Worker
//!
//! Saved preprint changes reach the external scholarly index through a
//! background worker:
//!
//! ```text
//! PreprintEditor::save ──dispatch──▶ ChannelSink ──mpsc──▶ run_export_worker
//!                                                            │
//!                                    format_preprint + envelope (read lock)
//!                                                            │
//!                                                            ▼
//!                                                Delivery::Http / Delivery::Log
//! ```
//!
//! Dispatch never blocks and never fails the request that caused it;
//! delivery errors are logged by the worker.

use crate::SharedPlatform;
use crate::config::ShareConfig;
use quire_core::{ExportSink, Platform, PreprintId, QuireError, envelope};
use serde_json::Value;
use tokio::sync::mpsc;

// =============================================================================
// CHANNEL SINK
// =============================================================================

/// Export sink feeding the worker queue.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<PreprintId>,
}

impl ExportSink for ChannelSink {
    fn dispatch(&self, preprint: &PreprintId) {
        if self.tx.send(preprint.clone()).is_err() {
            tracing::warn!(preprint = %preprint, "Export worker gone; dropping export");
        } else {
            tracing::debug!(preprint = %preprint, "Export queued");
        }
    }
}

/// Receiving end of the export queue.
#[derive(Debug)]
pub struct ExportQueue {
    rx: mpsc::UnboundedReceiver<PreprintId>,
}

impl ExportQueue {
    /// Next queued preprint; `None` once every sink is dropped.
    pub async fn recv(&mut self) -> Option<PreprintId> {
        self.rx.recv().await
    }
}

/// Create a connected sink and queue.
pub fn export_channel() -> (ChannelSink, ExportQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink { tx }, ExportQueue { rx })
}

// =============================================================================
// DELIVERY
// =============================================================================

/// Where rendered envelopes go.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// Log the envelope size only.
    Log,
    /// POST the envelope to the index.
    Http {
        client: reqwest::Client,
        url: String,
        token: Option<String>,
    },
}

impl Delivery {
    /// HTTP delivery when a URL is configured, logging otherwise.
    pub fn from_config(config: &ShareConfig) -> Self {
        match &config.url {
            Some(url) => Self::Http {
                client: reqwest::Client::new(),
                url: url.clone(),
                token: config.token.clone(),
            },
            None => Self::Log,
        }
    }

    /// Short description for startup logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Log => "log".to_string(),
            Self::Http { url, .. } => url.clone(),
        }
    }

    /// Deliver one envelope.
    pub async fn deliver(&self, preprint: &PreprintId, body: &Value) -> Result<(), QuireError> {
        match self {
            Self::Log => {
                let nodes = body["data"]["attributes"]["data"]["@graph"]
                    .as_array()
                    .map_or(0, Vec::len);
                tracing::info!(preprint = %preprint, nodes, "Metadata export (log only)");
                Ok(())
            }
            Self::Http { client, url, token } => {
                let mut request = client.post(url).json(body);
                if let Some(token) = token {
                    request = request.bearer_auth(token);
                }
                let response = request
                    .send()
                    .await
                    .map_err(|e| QuireError::IoError(format!("Export request failed: {}", e)))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(QuireError::IoError(format!(
                        "Index rejected export with status {}",
                        status
                    )));
                }
                tracing::info!(preprint = %preprint, status = status.as_u16(), "Metadata exported");
                Ok(())
            }
        }
    }
}

// =============================================================================
// WORKER
// =============================================================================

/// Format a preprint and wrap it for the index.
pub fn render(platform: &Platform, preprint: &PreprintId) -> Result<Value, QuireError> {
    let graph = platform.format_preprint(preprint)?;
    envelope(&graph)
}

/// Drain the queue until every sink is dropped.
///
/// Returns the number of envelopes delivered.
pub async fn run_export_worker(
    platform: SharedPlatform,
    mut queue: ExportQueue,
    delivery: Delivery,
) -> usize {
    tracing::info!(target_index = %delivery.describe(), "Export worker started");
    let mut delivered = 0;

    while let Some(preprint) = queue.recv().await {
        let body = {
            let platform = platform.read().await;
            render(&platform, &preprint)
        };
        let body = match body {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(preprint = %preprint, "Export formatting failed: {}", e);
                continue;
            }
        };
        match delivery.deliver(&preprint, &body).await {
            Ok(()) => delivered += 1,
            Err(e) => tracing::error!(preprint = %preprint, "Export delivery failed: {}", e),
        }
    }

    tracing::info!(delivered, "Export worker stopped");
    delivered
}

// =============================================================================
// TESTS
// =============================================================================
