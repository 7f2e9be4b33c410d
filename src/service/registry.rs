use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Entry {
    path: PathBuf,
    created: Instant,
}

/// Maps finished job ids to their output files for later download.
///
/// Entries are appended by workers and read by download lookups. With a TTL
/// set, entries older than the TTL are invisible to lookups and are dropped
/// on the next insert (or by [`JobRegistry::purge_expired`]), so the map
/// holds at most one TTL's worth of jobs.
#[derive(Debug, Default)]
pub struct JobRegistry {
    ttl: Option<Duration>,
    entries: Mutex<HashMap<Uuid, Entry>>,
}

impl JobRegistry {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        // A panicking writer cannot leave a half-inserted entry behind
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.duration_since(entry.created) >= ttl)
    }

    pub fn insert(&self, id: Uuid, path: PathBuf) {
        let now = Instant::now();
        let mut entries = self.lock();
        if self.ttl.is_some() {
            let before = entries.len();
            entries.retain(|_, entry| !self.is_expired(entry, now));
            if entries.len() < before {
                log::debug!("Purged {} expired jobs", before - entries.len());
            }
        }
        entries.insert(id, Entry { path, created: now });
    }

    /// Output path for a job, if it is known, unexpired, and still on disk
    pub fn get(&self, id: &Uuid) -> Option<PathBuf> {
        let entries = self.lock();
        let entry = entries.get(id)?;
        if self.is_expired(entry, Instant::now()) || !entry.path.exists() {
            return None;
        }
        Some(entry.path.clone())
    }

    /// Lookup by the textual id used in download URLs
    pub fn get_str(&self, id: &str) -> Option<PathBuf> {
        let id = Uuid::parse_str(id).ok()?;
        self.get(&id)
    }

    /// Drop expired entries and return how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        let removed = before - entries.len();
        if removed > 0 {
            log::debug!("Purged {} expired jobs", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
