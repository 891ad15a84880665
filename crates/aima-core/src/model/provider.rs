//! External-effects contract for the model domain.

use super::types::{
    Model, ModelRequirements, ModelSearchResult, ModelType, PullProgress, PullRequest,
    VerificationResult,
};
use crate::cancel::CancellationToken;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

/// Fetch, search, import, verify and size models.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Pull a model, streaming progress into `progress`.
    ///
    /// The sender is dropped when the pull returns, which ends the stream.
    async fn pull(
        &self,
        request: &PullRequest,
        progress: ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Model>;

    async fn search(
        &self,
        query: &str,
        source: &str,
        model_type: Option<ModelType>,
        limit: usize,
    ) -> Result<Vec<ModelSearchResult>>;

    async fn import_local(&self, path: &Path, auto_detect: bool) -> Result<Model>;

    async fn verify(&self, model_id: &str, checksum: Option<&str>) -> Result<VerificationResult>;

    async fn estimate_resources(&self, model_id: &str) -> Result<ModelRequirements>;

    /// Drop whatever the provider remembers about a deleted model.
    async fn forget(&self, _model_id: &str) {}
}

/// Producer side of a pull's progress channel.
///
/// Intermediate updates are dropped when the consumer lags; terminal
/// `completed`/`error` records are always delivered while the receiver lives.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::Sender<PullProgress>>,
}

impl ProgressReporter {
    pub fn new(tx: mpsc::Sender<PullProgress>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Reporter that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Best-effort intermediate update.
    pub fn update(&self, progress: PullProgress) {
        let Some(tx) = &self.tx else { return };
        match tx.try_send(progress) {
            Ok(()) => {}
            Err(TrySendError::Full(p)) => trace!("Dropping progress update for {}", p.model_id),
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Terminal update; waits for buffer space.
    pub async fn finish(&self, progress: PullProgress) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(progress).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_drops_when_full_but_finish_delivers() {
        let (tx, mut rx) = mpsc::channel(2);
        let reporter = ProgressReporter::new(tx);

        for i in 0..5 {
            reporter.update(PullProgress {
                model_id: "m".into(),
                bytes_done: i,
                ..Default::default()
            });
        }

        let finisher = {
            let reporter = reporter.clone();
            tokio::spawn(async move { reporter.finish(PullProgress::completed("m")).await })
        };
        drop(reporter);

        let mut received = Vec::new();
        while let Some(p) = rx.recv().await {
            received.push(p);
        }
        finisher.await.unwrap();

        assert_eq!(received.len(), 3);
        assert_eq!(received[0].bytes_done, 0);
        assert_eq!(received[1].bytes_done, 1);
        assert!(received.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_disabled_reporter_is_silent() {
        let reporter = ProgressReporter::disabled();
        reporter.update(PullProgress::default());
        reporter.finish(PullProgress::completed("m")).await;
    }
}
