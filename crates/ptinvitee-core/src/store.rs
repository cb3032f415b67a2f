// ── Site data store ──
//
// Two JSON documents under the data directory:
//   site_data.json  { "<site>": { "data": SiteSnapshot, "last_update": secs } }
//   last_run.json   the latest RunSummary
//
// Writes go to a temp file in the same directory, are synced, then renamed
// over the target, so readers never observe a partial document. A failed
// site's entry is simply never written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{SiteSnapshot, StoredSite};
use crate::summary::RunSummary;

const DATA_FILE: &str = "site_data.json";
const LAST_RUN_FILE: &str = "last_run.json";

/// Map of site name to its last good snapshot.
pub type SiteData = BTreeMap<String, StoredSite>;

/// Persistent per-site snapshots plus the last run summary.
#[derive(Debug)]
pub struct SiteDataStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

fn storage_err(path: &Path, source: std::io::Error) -> CoreError {
    CoreError::Storage {
        path: path.display().to_string(),
        source,
    }
}

impl SiteDataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn data_path(&self) -> PathBuf {
        self.dir.join(DATA_FILE)
    }

    pub fn last_run_path(&self) -> PathBuf {
        self.dir.join(LAST_RUN_FILE)
    }

    // ── Reads ────────────────────────────────────────────────────────

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CoreError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_err(path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| CoreError::CorruptStore {
                path: path.display().to_string(),
                source,
            })
    }

    /// Every stored site. A missing file is an empty store.
    pub async fn all(&self) -> Result<SiteData, CoreError> {
        Ok(Self::read_json(&self.data_path()).await?.unwrap_or_default())
    }

    pub async fn get(&self, site: &str) -> Result<Option<StoredSite>, CoreError> {
        Ok(self.all().await?.remove(site))
    }

    /// Most recent `last_update` across all sites.
    pub async fn last_update_time(&self) -> Result<Option<i64>, CoreError> {
        Ok(self.all().await?.values().map(|s| s.last_update).max())
    }

    /// Whether `site` was refreshed less than `ttl` before `now`.
    pub async fn is_fresh(&self, site: &str, ttl: Duration, now: i64) -> Result<bool, CoreError> {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Ok(self
            .get(site)
            .await?
            .is_some_and(|s| now.saturating_sub(s.last_update) < ttl))
    }

    pub async fn load_last_run(&self) -> Result<Option<RunSummary>, CoreError> {
        Self::read_json(&self.last_run_path()).await
    }

    // ── Writes ───────────────────────────────────────────────────────

    async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), CoreError> {
        let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| CoreError::Internal(format!(
            "serializing {}: {e}",
            path.display()
        )))?;
        bytes.push(b'\n');

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage_err(&self.dir, e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = self.dir.join(format!(".{file_name}.tmp"));

        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| storage_err(&tmp, e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| storage_err(&tmp, e))?;
        file.sync_all().await.map_err(|e| storage_err(&tmp, e))?;
        drop(file);

        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| storage_err(path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "store written");
        Ok(())
    }

    /// Replace `site`'s entry with `snapshot`, stamped `now`.
    pub async fn update(
        &self,
        site: &str,
        snapshot: SiteSnapshot,
        now: i64,
    ) -> Result<StoredSite, CoreError> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.all().await?;
        let stored = StoredSite {
            data: snapshot,
            last_update: now,
        };
        data.insert(site.to_string(), stored.clone());
        self.write_json(&self.data_path(), &data).await?;
        Ok(stored)
    }

    /// Drop `site`'s entry. Returns whether it existed.
    pub async fn remove(&self, site: &str) -> Result<bool, CoreError> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.all().await?;
        if data.remove(site).is_none() {
            return Ok(false);
        }
        self.write_json(&self.data_path(), &data).await?;
        Ok(true)
    }

    /// Drop every entry.
    pub async fn clear(&self) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_json(&self.data_path(), &SiteData::new()).await
    }

    pub async fn save_last_run(&self, summary: &RunSummary) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_json(&self.last_run_path(), summary).await
    }
}
