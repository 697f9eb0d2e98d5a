//! Remembered unlocks
//!
//! Records which confessions and replies this device has already unlocked
//! so a revisit skips the PIN prompt. The cache is bounded: when full, the
//! oldest unlock is evicted, and entries older than the time-to-live are
//! treated as absent.
//!
//! A cache opened with `load` writes itself back to the same file on every
//! change, so an unlock survives the process being killed. Persisted as
//! JSON, e.g. `unlocks.json`:
//! `{"version":1,"entries":[{"key":"confession:<id>","unlockedAt":"..."}]}`

use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::fs;

const SNAPSHOT_VERSION: u32 = 1;

/// Device-local memory of successful unlocks, keyed by gate key
pub trait UnlockCache: Send + Sync {
    fn remember(&self, key: &str);
    fn is_remembered(&self, key: &str) -> bool;
    fn forget(&self, key: &str);
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotEntry {
    key: String,
    unlocked_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<SnapshotEntry>,
}

type Entries = HashMap<String, DateTime<Utc>>;

/// In-memory unlock cache with capacity and expiry
pub struct BoundedUnlockCache {
    entries: Mutex<Entries>,
    capacity: usize,
    ttl: Option<Duration>,
    persist_path: Option<PathBuf>,
}

impl BoundedUnlockCache {
    /// Memory-only cache. `ttl` of `None` keeps unlocks until evicted by
    /// capacity.
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
            persist_path: None,
        }
    }

    /// Open the cache backed by `path`.
    ///
    /// A missing file yields an empty cache. An unreadable, corrupt or
    /// unknown-version file is moved aside and the cache starts empty:
    /// losing remembered unlocks only means PINs are asked again.
    pub async fn load(path: &Path, capacity: usize, ttl: Option<Duration>) -> Self {
        let mut cache = Self::new(capacity, ttl);
        cache.persist_path = Some(path.to_path_buf());

        if !path.exists() {
            tracing::debug!("No unlock cache at {:?}, starting empty", path);
            return cache;
        }

        let snapshot = match fs::read_to_string(path).await {
            Ok(content) => parse_snapshot(&content),
            Err(e) => Err(e.into()),
        };

        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Discarding unreadable unlock cache {:?}: {}", path, e);
                let aside = path.with_extension("corrupt");
                if let Err(e) = fs::rename(path, &aside).await {
                    tracing::warn!("Could not move {:?} aside: {}", path, e);
                }
                return cache;
            }
        };

        let now = Utc::now();
        {
            let mut entries = cache.lock();
            for entry in snapshot.entries {
                if !cache.is_expired(entry.unlocked_at, now) {
                    entries.insert(entry.key, entry.unlocked_at);
                }
            }
            cache.evict_overflow(&mut entries);
        }

        tracing::info!("Loaded {} remembered unlocks from {:?}", cache.len(), path);
        cache
    }

    /// Write the live entries to `path`, replacing the file atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let entries = self.lock();
        self.write_snapshot(&entries, path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remember_at(&self, key: &str, now: DateTime<Utc>) {
        let mut entries = self.lock();
        entries.insert(key.to_string(), now);
        self.evict_overflow(&mut entries);
        self.persist(&entries);
    }

    fn is_remembered_at(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(at) if self.is_expired(*at, now) => {
                entries.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    fn is_expired(&self, unlocked_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.ttl.is_some_and(|ttl| now - unlocked_at > ttl)
    }

    fn evict_overflow(&self, entries: &mut Entries) {
        while entries.len() > self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, at)| **at)
                .map(|(key, _)| key.clone());

            match oldest {
                Some(key) => {
                    tracing::debug!("Evicting remembered unlock: {}", key);
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }

    // Called with the lock held so concurrent writers cannot interleave
    fn persist(&self, entries: &Entries) {
        if let Some(path) = &self.persist_path {
            if let Err(e) = self.write_snapshot(entries, path) {
                tracing::warn!("Failed to persist unlock cache to {:?}: {}", path, e);
            }
        }
    }

    fn write_snapshot(&self, entries: &Entries, path: &Path) -> Result<()> {
        let now = Utc::now();
        let mut live: Vec<SnapshotEntry> = entries
            .iter()
            .filter(|(_, at)| !self.is_expired(**at, now))
            .map(|(key, at)| SnapshotEntry {
                key: key.clone(),
                unlocked_at: *at,
            })
            .collect();
        live.sort_by(|a, b| a.unlocked_at.cmp(&b.unlocked_at));

        let content = serde_json::to_string_pretty(&Snapshot {
            version: SNAPSHOT_VERSION,
            entries: live,
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write to temp file first (atomic write)
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, path)?;

        tracing::debug!("Saved unlock cache to {:?}", path);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn parse_snapshot(content: &str) -> Result<Snapshot> {
    let snapshot: Snapshot = serde_json::from_str(content)?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(AppError::Generic(format!(
            "Unsupported unlock cache version: {}",
            snapshot.version
        )));
    }

    Ok(snapshot)
}

impl UnlockCache for BoundedUnlockCache {
    fn remember(&self, key: &str) {
        self.remember_at(key, Utc::now());
    }

    fn is_remembered(&self, key: &str) -> bool {
        self.is_remembered_at(key, Utc::now())
    }

    fn forget(&self, key: &str) {
        let mut entries = self.lock();
        if entries.remove(key).is_some() {
            self.persist(&entries);
        }
    }
}
