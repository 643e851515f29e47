use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;

use crate::data_models::CachedResponse;

/// Storage for HTTP responses, keyed by request identity.
/// Expiry is the caller's concern; stores keep whatever they are given.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<CachedResponse>;
    fn put(&self, key: &str, response: CachedResponse);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds the cache key for a GET request. Only headers that change the
/// response body are part of the key.
pub fn cache_key(url: &str, accept: Option<&str>) -> String {
    match accept {
        Some(accept) => format!("GET {url} accept={accept}"),
        None => format!("GET {url}"),
    }
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CachedResponse>,
}

impl MemoryCache {
    pub fn new() -> MemoryCache {
        MemoryCache::default()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<CachedResponse> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: &str, response: CachedResponse) {
        self.entries.insert(key.to_string(), response);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// JSON file on disk, loaded once and rewritten after every insert.
/// Entries older than `ttl` are dropped on load and on every rewrite.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    ttl: ChronoDuration,
    entries: DashMap<String, CachedResponse>,
    write_lock: Mutex<()>,
}

impl FileCache {
    /// Opens (or starts) a cache at `path`. A missing or unreadable file
    /// yields an empty cache rather than an error.
    pub fn open(path: impl Into<PathBuf>, ttl: ChronoDuration) -> FileCache {
        let path = path.into();
        let entries = match Self::load(&path, ttl) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("ignoring response cache at {}: {:#}", path.display(), e);
                DashMap::new()
            }
        };
        log::debug!("response cache {} holds {} entries", path.display(), entries.len());
        FileCache {
            path,
            ttl,
            entries,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path, ttl: ChronoDuration) -> Result<DashMap<String, CachedResponse>> {
        if !path.exists() {
            return Ok(DashMap::new());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let entries: BTreeMap<String, CachedResponse> =
            serde_json::from_str(&raw).context("cache file is not valid json")?;
        let now = Utc::now();
        let total = entries.len();
        let fresh: DashMap<String, CachedResponse> = entries
            .into_iter()
            .filter(|(_, response)| response.is_fresh(now, ttl))
            .collect();
        if fresh.len() < total {
            log::debug!("dropped {} expired cache entries", total - fresh.len());
        }
        Ok(fresh)
    }

    /// Writes to a sibling temp file and renames it over the cache file.
    fn persist(&self) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("cache write lock poisoned"))?;
        let now = Utc::now();
        self.entries
            .retain(|_, response| response.is_fresh(now, self.ttl));
        let snapshot: BTreeMap<String, CachedResponse> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let json = serde_json::to_string(&snapshot).context("failed to serialize cache")?;
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)
                .with_context(|| format!("failed to create {}", tmp.display()))?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move cache into {}", self.path.display()))?;
        Ok(())
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &str) -> Option<CachedResponse> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: &str, response: CachedResponse) {
        self.entries.insert(key.to_string(), response);
        if let Err(e) = self.persist() {
            log::error!("error writing response cache: {:#}", e);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
