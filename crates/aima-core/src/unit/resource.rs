//! URI-addressed read-only resources and polling watch.

use super::UnitContext;
use crate::cancel::CancellationToken;
use crate::config::ResourceConfig;
use crate::error::{AimaError, Result};
use crate::schema::Schema;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Addressable read-only entity.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Concrete URI, e.g. `asms://model/model-1234abcd`.
    fn uri(&self) -> String;

    fn domain(&self) -> &str;

    fn schema(&self) -> Schema;

    async fn get(&self, ctx: &UnitContext) -> Result<Value>;

    /// Whether [`watch_resource`] may be used on this resource.
    fn watchable(&self) -> bool {
        false
    }
}

/// Manufactures resources for a URI pattern such as `asms://catalog/recipe/*`.
pub trait ResourceFactory: Send + Sync {
    fn pattern(&self) -> &str;

    fn can_create(&self, uri: &str) -> bool;

    fn create(&self, uri: &str) -> Result<Arc<dyn Resource>>;
}

/// Kind of change reported by a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOperation {
    Refresh,
    StatusChanged,
    Error,
}

/// One observation of a watched resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUpdate {
    pub uri: String,
    pub timestamp: DateTime<Utc>,
    pub operation: UpdateOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Watch a resource by polling `get` every `interval`.
///
/// The first poll happens one interval after the call. `status_changed` is
/// reported when the `status` field differs from the previous poll; other
/// successful polls report `refresh`. The stream ends when `cancel` fires or
/// the receiver is dropped.
pub fn watch_resource(
    resource: Arc<dyn Resource>,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<mpsc::Receiver<ResourceUpdate>> {
    let uri = resource.uri();
    if !resource.watchable() {
        return Err(AimaError::WatchNotSupported { uri });
    }

    let (tx, rx) = mpsc::channel(ResourceConfig::WATCH_BUFFER);
    let ctx = UnitContext::new(format!("watch:{}", uri), cancel.clone());

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        let mut last_status: Option<String> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let update = match resource.get(&ctx).await {
                Ok(data) => {
                    let status = data
                        .get("status")
                        .and_then(|s| s.as_str())
                        .map(str::to_string);
                    let changed = matches!((&last_status, &status), (Some(prev), Some(now)) if prev != now);
                    if status.is_some() {
                        last_status = status;
                    }
                    ResourceUpdate {
                        uri: uri.clone(),
                        timestamp: Utc::now(),
                        operation: if changed {
                            UpdateOperation::StatusChanged
                        } else {
                            UpdateOperation::Refresh
                        },
                        data: Some(data),
                        error: None,
                    }
                }
                Err(e) => ResourceUpdate {
                    uri: uri.clone(),
                    timestamp: Utc::now(),
                    operation: UpdateOperation::Error,
                    data: None,
                    error: Some(e.to_string()),
                },
            };

            if tx.send(update).await.is_err() {
                break;
            }
        }
        debug!("Watch on {} stopped", uri);
    });

    Ok(rx)
}
