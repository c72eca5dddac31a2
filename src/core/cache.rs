//! Content-addressed cache of generated messages
//!
//! Entries live in an in-process map and as one JSON file per key on disk.
//! Nothing here fails loudly: I/O and parse errors are logged at debug and
//! treated as a miss.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::config::CacheConfig;

/// On-disk form of one entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: String,
    /// Unix milliseconds when the entry was written
    pub timestamp: i64,
    pub hash: String,
    pub model: String,
    pub provider: String,
}

impl CacheEntry {
    fn is_expired(&self, now: i64, ttl_ms: i64) -> bool {
        now >= self.timestamp.saturating_add(ttl_ms)
    }
}

/// Cache manager
pub struct CacheManager {
    enabled: bool,
    dir: PathBuf,
    ttl_ms: i64,
    max_memory_entries: usize,
    memory: Mutex<HashMap<String, CacheEntry>>,
}

impl CacheManager {
    /// Cache in the configured directory, else the platform cache directory
    pub fn new(config: &CacheConfig) -> Self {
        let dir = config.dir.clone().unwrap_or_else(default_dir);
        Self::with_dir(config, dir)
    }

    pub fn with_dir(config: &CacheConfig, dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: config.enabled,
            dir: dir.into(),
            ttl_ms: (config.ttl_secs.saturating_mul(1000)).min(i64::MAX as u64) as i64,
            max_memory_entries: config.max_memory_entries,
            memory: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Key for a result generated from `content` under these model settings
    pub fn key(content: &str, model: &str, provider: &str, temperature: f32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(normalize(content).as_bytes());
        hasher.update([0u8]);
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(provider.as_bytes());
        hasher.update([0u8]);
        hasher.update(format!("{:.3}", temperature).as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Get cached message for a key
    pub fn get(&self, key: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let now = now_ms();

        {
            let mut memory = self.lock();
            match memory.get(key) {
                Some(entry) if !entry.is_expired(now, self.ttl_ms) => {
                    debug!(key, "Cache hit (memory)");
                    return Some(entry.data.clone());
                }
                Some(_) => {
                    memory.remove(key);
                }
                None => {}
            }
        }

        let path = self.entry_path(key);
        let entry = read_entry(&path)?;
        if entry.hash != key || entry.is_expired(now, self.ttl_ms) {
            debug!(key, "Discarding stale cache file");
            remove_quietly(&path);
            return None;
        }

        debug!(key, "Cache hit (disk)");
        let data = entry.data.clone();
        self.remember(key, entry);
        Some(data)
    }

    /// Set cached message in both tiers
    pub fn set(&self, key: &str, message: &str, model: &str, provider: &str) {
        self.set_at(key, message, model, provider, now_ms());
    }

    fn set_at(&self, key: &str, message: &str, model: &str, provider: &str, timestamp: i64) {
        if !self.enabled {
            return;
        }
        let entry = CacheEntry {
            data: message.to_string(),
            timestamp,
            hash: key.to_string(),
            model: model.to_string(),
            provider: provider.to_string(),
        };

        if let Err(err) = self.write_entry(key, &entry) {
            debug!(key, error = %err, "Failed to write cache file");
        }
        self.remember(key, entry);
    }

    /// Delete disk entries that are expired or unreadable; returns how many
    pub fn cleanup(&self) -> usize {
        let now = now_ms();
        self.lock().retain(|_, entry| !entry.is_expired(now, self.ttl_ms));

        let mut removed = 0;
        for path in self.entry_files() {
            let keep = read_entry(&path).is_some_and(|entry| !entry.is_expired(now, self.ttl_ms));
            if !keep && remove_quietly(&path) {
                removed += 1;
            }
        }
        debug!(removed, "Cache cleanup");
        removed
    }

    /// Remove every entry; returns how many files were deleted
    pub fn clear(&self) -> usize {
        self.lock().clear();
        let removed = self
            .entry_files()
            .into_iter()
            .filter(|path| remove_quietly(path))
            .count();
        debug!(removed, "Cache cleared");
        removed
    }

    /// Entries currently held in memory
    #[cfg(test)]
    pub fn memory_len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A poisoned map only ever holds complete entries
        self.memory.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert into memory, evicting the oldest entries above the cap
    fn remember(&self, key: &str, entry: CacheEntry) {
        let mut memory = self.lock();
        memory.insert(key.to_string(), entry);

        while memory.len() > self.max_memory_entries {
            let oldest = memory
                .iter()
                .min_by_key(|(_, e)| e.timestamp)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    memory.remove(&k);
                }
                None => break,
            }
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn entry_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect()
    }

    fn write_entry(&self, key: &str, entry: &CacheEntry) -> std::io::Result<()> {
        create_private_dir(&self.dir)?;
        let json = serde_json::to_vec(entry)?;
        let mut file = private_file(&self.entry_path(key))?;
        file.write_all(&json)
    }
}

fn default_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "nexus", "commit")
        .map(|p| p.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".nexus-cache"))
}

/// Unify line endings, strip trailing whitespace per line, trim the whole
pub fn normalize(content: &str) -> String {
    content
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn read_entry(path: &Path) -> Option<CacheEntry> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(entry) => Some(entry),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "Unreadable cache file");
            None
        }
    }
}

fn remove_quietly(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "Failed to remove cache file");
            false
        }
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::create_dir_all(dir)?;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn private_file(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn private_file(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
