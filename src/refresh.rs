//! Snapshot regeneration policy and background execution.
//!
//! [`Refresher`] ties the pipeline to the store. It decides whether a run is
//! needed (missing or stale snapshot, or a forced refresh), holds the
//! in-flight marker for the duration of the run, and publishes progress on a
//! `watch` channel so callers can observe a regeneration running on a
//! spawned task.

use crate::http::FetchText;
use crate::pipeline::{Pipeline, PipelineError};
use crate::store::{InFlightMarker, SnapshotStore};
use crate::translate::Translate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Progress of the most recent regeneration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshStatus {
    Idle,
    Running,
    Finished { count: usize },
    Failed { reason: String },
    /// Nothing to do: the snapshot is fresh or another run holds the marker.
    Skipped,
}

/// What a refresh request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Regenerated { count: usize },
    Fresh,
    InFlight,
}

/// When to regenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Only when the snapshot is missing or older than the TTL.
    IfStale(Duration),
    Force,
}

pub struct Refresher<F, T> {
    pipeline: Pipeline<F, T>,
    store: SnapshotStore,
    marker: InFlightMarker,
    status: watch::Sender<RefreshStatus>,
    cancel: CancellationToken,
}

impl<F, T> Refresher<F, T>
where
    F: FetchText + 'static,
    T: Translate + 'static,
{
    pub fn new(pipeline: Pipeline<F, T>, store: SnapshotStore, marker: InFlightMarker) -> Self {
        let (status, _) = watch::channel(RefreshStatus::Idle);
        Self {
            pipeline,
            store,
            marker,
            status,
            cancel: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn marker(&self) -> &InFlightMarker {
        &self.marker
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> RefreshStatus {
        self.status.borrow().clone()
    }

    /// Token that aborts a running regeneration.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Regenerate the snapshot if `policy` asks for it.
    ///
    /// On failure the previous snapshot is left untouched.
    #[instrument(level = "info", skip_all, fields(path = %self.store.path().display(), mode = ?self.pipeline.config().mode, ?policy))]
    pub async fn refresh(&self, policy: RefreshPolicy) -> Result<RefreshOutcome, PipelineError> {
        if let RefreshPolicy::IfStale(ttl) = policy {
            if !self.store.is_stale(ttl).await? {
                info!("Snapshot is fresh; nothing to do");
                self.status.send_replace(RefreshStatus::Skipped);
                return Ok(RefreshOutcome::Fresh);
            }
        }

        let Some(_guard) = self.marker.try_acquire().await? else {
            info!("Another regeneration is in flight");
            self.status.send_replace(RefreshStatus::Skipped);
            return Ok(RefreshOutcome::InFlight);
        };

        self.status.send_replace(RefreshStatus::Running);
        let result = async {
            let articles = self.pipeline.run(&self.cancel).await?;
            self.store.save(&articles).await?;
            Ok::<_, PipelineError>(articles.len())
        }
        .await;

        match result {
            Ok(count) => {
                info!(count, "Snapshot regenerated");
                self.status.send_replace(RefreshStatus::Finished { count });
                Ok(RefreshOutcome::Regenerated { count })
            }
            Err(e) => {
                error!(error = %e, "Regeneration failed; previous snapshot kept");
                self.status.send_replace(RefreshStatus::Failed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Run [`Refresher::refresh`] on a background task.
    pub fn spawn(
        self: &Arc<Self>,
        policy: RefreshPolicy,
    ) -> JoinHandle<Result<RefreshOutcome, PipelineError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.refresh(policy).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeedEntry, Mode};
    use crate::http::tests::StaticFetcher;
    use crate::pipeline::tests::{config, rss};
    use crate::translate::tests::DictTranslator;

    fn refresher(dir: &std::path::Path, fetcher: StaticFetcher) -> Refresher<StaticFetcher, DictTranslator> {
        let config = config(
            Mode::Flat,
            vec![(
                "AIニュース",
                vec![FeedEntry {
                    url: "https://feeds.example/zenn".to_string(),
                    name: "Zenn".to_string(),
                    limit: None,
                    foreign: false,
                }],
            )],
        );
        let store = SnapshotStore::new(dir.join("daily_curation.json"));
        let marker = InFlightMarker::beside(&store);
        Refresher::new(Pipeline::new(config, fetcher, DictTranslator::default()), store, marker)
    }

    fn zenn_feed() -> StaticFetcher {
        StaticFetcher::default().with(
            "https://feeds.example/zenn",
            &rss(&[("Rustで始めるLLM", "https://zenn.example/1", "Tue, 06 May 2025 10:00:00 GMT")]),
        )
    }

    #[tokio::test]
    async fn test_refresh_regenerates_then_skips_fresh_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let refresher = refresher(dir.path(), zenn_feed());
        let ttl = RefreshPolicy::IfStale(Duration::from_secs(3600));

        let outcome = refresher.refresh(ttl).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Regenerated { count: 1 });
        assert_eq!(refresher.status(), RefreshStatus::Finished { count: 1 });
        assert!(!refresher.marker.path().exists());

        assert_eq!(refresher.refresh(ttl).await.unwrap(), RefreshOutcome::Fresh);
        assert_eq!(refresher.status(), RefreshStatus::Skipped);

        let outcome = refresher.refresh(RefreshPolicy::Force).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Regenerated { count: 1 });
    }

    #[tokio::test]
    async fn test_failed_run_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        refresher(dir.path(), zenn_feed())
            .refresh(RefreshPolicy::Force)
            .await
            .unwrap();

        let broken = refresher(dir.path(), StaticFetcher::default());
        let err = broken.refresh(RefreshPolicy::Force).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoArticles));
        assert!(matches!(broken.status(), RefreshStatus::Failed { .. }));

        let kept = broken.store().load().await.unwrap().unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].url, "https://zenn.example/1");
    }

    #[tokio::test]
    async fn test_live_marker_skips_run() {
        let dir = tempfile::tempdir().unwrap();
        let refresher = refresher(dir.path(), zenn_feed());
        let _held = refresher.marker.try_acquire().await.unwrap().unwrap();

        let outcome = refresher.refresh(RefreshPolicy::Force).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::InFlight);
        assert_eq!(refresher.store().load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_spawned_refresh_reports_through_watch() {
        let dir = tempfile::tempdir().unwrap();
        let refresher = Arc::new(refresher(dir.path(), zenn_feed()));
        let mut status = refresher.subscribe();

        let handle = refresher.spawn(RefreshPolicy::Force);
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome, RefreshOutcome::Regenerated { count: 1 });
        assert_eq!(*status.borrow_and_update(), RefreshStatus::Finished { count: 1 });
    }

    #[tokio::test]
    async fn test_cancelled_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let refresher = refresher(dir.path(), zenn_feed());
        refresher.cancel_token().cancel();
        let err = refresher.refresh(RefreshPolicy::Force).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert!(!refresher.marker.path().exists());
    }
}
