//! Snapshot persistence and the in-flight regeneration marker.
//!
//! The snapshot is a single pretty-printed JSON array of [`CuratedArticle`].
//! It is replaced atomically (temp file, fsync, rename) so readers see either
//! the previous snapshot or the new one, never a partial file.
//!
//! The [`InFlightMarker`] is a small file next to the snapshot that tells
//! other processes a regeneration is running. A marker older than
//! [`MARKER_ABANDON_AFTER`] is considered left behind by a crashed run.

use crate::models::CuratedArticle;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Default snapshot location.
pub const DEFAULT_SNAPSHOT_PATH: &str = "data/daily_curation.json";
/// Default freshness window of a snapshot.
pub const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);
/// Age after which an in-flight marker is treated as abandoned.
pub const MARKER_ABANDON_AFTER: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Age of the file at `path` by modification time, `None` if it is absent.
///
/// A modification time in the future counts as age zero.
async fn file_age(path: &Path) -> Result<Option<Duration>, std::io::Error> {
    match fs::metadata(path).await {
        Ok(meta) => {
            let modified = meta.modified()?;
            Ok(Some(SystemTime::now().duration_since(modified).unwrap_or_default()))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// The JSON snapshot on disk.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file used for the atomic replace.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read the snapshot; `None` when no snapshot has been written yet.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<Option<Vec<CuratedArticle>>, StoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No snapshot yet");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let articles: Vec<CuratedArticle> = serde_json::from_slice(&bytes)?;
        info!(count = articles.len(), "Loaded snapshot");
        Ok(Some(articles))
    }

    /// Replace the snapshot with `articles`.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), count = articles.len()))]
    pub async fn save(&self, articles: &[CuratedArticle]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(articles)?;

        let tmp = self.temp_path();
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        info!(bytes = json.len(), "Snapshot written");
        Ok(())
    }

    /// Whether the snapshot is missing or older than `ttl`.
    pub async fn is_stale(&self, ttl: Duration) -> Result<bool, StoreError> {
        let stale = match file_age(&self.path).await? {
            None => true,
            Some(age) => age > ttl,
        };
        debug!(stale, ?ttl, "Checked snapshot freshness");
        Ok(stale)
    }
}

/// Marker file signalling a regeneration in progress.
#[derive(Debug, Clone)]
pub struct InFlightMarker {
    path: PathBuf,
    abandon_after: Duration,
}

impl InFlightMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            abandon_after: MARKER_ABANDON_AFTER,
        }
    }

    /// The marker conventionally sits next to the snapshot.
    pub fn beside(store: &SnapshotStore) -> Self {
        let mut name = store
            .path()
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".generating");
        Self::new(store.path().with_file_name(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn create_exclusive(&self) -> Result<bool, std::io::Error> {
        let opened = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await;
        match opened {
            Ok(mut file) => {
                let stamp = format!("{} {}\n", std::process::id(), chrono::Utc::now().to_rfc3339());
                file.write_all(stamp.as_bytes()).await?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create the marker unless a live one exists.
    ///
    /// Returns `None` when another regeneration holds a marker younger than
    /// the abandonment age. An older marker is removed and replaced.
    pub async fn try_acquire(&self) -> Result<Option<MarkerGuard>, StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        if self.create_exclusive().await? {
            return Ok(Some(MarkerGuard { path: self.path.clone() }));
        }

        match file_age(&self.path).await? {
            Some(age) if age <= self.abandon_after => {
                debug!(?age, "Regeneration already in flight");
                Ok(None)
            }
            age => {
                warn!(?age, path = %self.path.display(), "Replacing abandoned in-flight marker");
                self.release().await?;
                Ok(self
                    .create_exclusive()
                    .await?
                    .then(|| MarkerGuard { path: self.path.clone() }))
            }
        }
    }

    /// Whether a non-abandoned marker exists.
    pub async fn is_active(&self) -> Result<bool, StoreError> {
        Ok(file_age(&self.path)
            .await?
            .is_some_and(|age| age <= self.abandon_after))
    }

    /// Remove the marker if present.
    pub async fn release(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Removes the in-flight marker when dropped.
#[derive(Debug)]
pub struct MarkerGuard {
    path: PathBuf,
}

impl Drop for MarkerGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(error = %e, path = %self.path.display(), "Failed to remove in-flight marker");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::article_id;

    fn record(link: &str, timestamp: i64) -> CuratedArticle {
        CuratedArticle {
            id: article_id(link),
            category: "ビジネス・経済".to_string(),
            title_ja: "市場の動き".to_string(),
            title: Some("Market moves".to_string()),
            summary: Some("Markets moved.".to_string()),
            tags: vec!["市場".to_string()],
            insight: "💡 影響: 市場市場の競争が激化".to_string(),
            core_sentence: "市場が動いた。".to_string(),
            source: "HN Business".to_string(),
            read_time_min: 2,
            url: link.to_string(),
            published_at: "2025/05/06 14:30".to_string(),
            timestamp,
        }
    }

    fn set_age(path: &Path, age: Duration) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("data/daily_curation.json"));
        assert_eq!(store.load().await.unwrap(), None);

        let articles = vec![record("https://a", 2), record("https://b", 1)];
        store.save(&articles).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(articles));
        assert!(!store.temp_path().exists());

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("市場の動き"), "non-ASCII text is written unescaped");
    }

    #[tokio::test]
    async fn test_save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshot.json"));
        store.save(&[record("https://a", 1)]).await.unwrap();
        store.save(&[]).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn test_load_corrupt_snapshot_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshot.json"));
        std::fs::write(store.path(), "[{").unwrap();
        assert!(matches!(store.load().await, Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn test_is_stale_by_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshot.json"));
        assert!(store.is_stale(DEFAULT_TTL).await.unwrap());

        store.save(&[record("https://a", 1)]).await.unwrap();
        assert!(!store.is_stale(DEFAULT_TTL).await.unwrap());

        set_age(store.path(), Duration::from_secs(7 * 60 * 60));
        assert!(store.is_stale(DEFAULT_TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_marker_is_exclusive_and_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let marker = InFlightMarker::new(dir.path().join("generating"));
        assert!(!marker.is_active().await.unwrap());

        let guard = marker.try_acquire().await.unwrap().expect("first acquire");
        assert!(marker.is_active().await.unwrap());
        assert!(marker.try_acquire().await.unwrap().is_none());

        drop(guard);
        assert!(!marker.path().exists());
        assert!(marker.try_acquire().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_abandoned_marker_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let marker = InFlightMarker::new(dir.path().join("generating"));
        std::fs::write(marker.path(), "crashed run").unwrap();
        set_age(marker.path(), Duration::from_secs(11 * 60));
        assert!(!marker.is_active().await.unwrap());

        let guard = marker.try_acquire().await.unwrap();
        assert!(guard.is_some());
        assert!(marker.is_active().await.unwrap());
    }

    #[test]
    fn test_marker_beside_snapshot() {
        let store = SnapshotStore::new("data/daily_curation.json");
        let marker = InFlightMarker::beside(&store);
        assert_eq!(marker.path(), Path::new("data/daily_curation.json.generating"));
    }
}
