use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

pub const DEFAULT_CAPACITY: usize = 200;
pub const DEFAULT_TTL_SECS: u64 = 30 * 60;

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    text: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    // Insertion order of the keys in `entries`, oldest first.
    order: VecDeque<String>,
}

impl Inner {
    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}

/// TTL-bounded store of generated fortunes with first-in-first-out eviction.
///
/// Expired entries are dropped lazily when looked up. Once the store holds
/// more than `capacity` entries, the oldest inserted one is evicted;
/// reads never change eviction order.
pub struct FortuneCache {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl FortuneCache {
    pub fn new(capacity: usize, ttl_secs: u64) -> Self {
        Self::with_clock(capacity, ttl_secs, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity,
            ttl: Duration::from_std(std::time::Duration::from_secs(ttl_secs))
                .unwrap_or_else(|_| Duration::days(365)),
            clock,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut inner = self.lock();
        let (text, expires_at) = match inner.entries.get(key) {
            Some(entry) => (entry.text.clone(), entry.expires_at),
            None => return None,
        };
        if now > expires_at {
            inner.remove(key);
            return None;
        }
        Some(text)
    }

    pub fn insert(&self, key: String, text: String) {
        let expires_at = self.clock.now() + self.ttl;
        let mut inner = self.lock();
        let entry = CacheEntry { text, expires_at };
        // Overwriting keeps the key's original insertion slot.
        if inner.entries.insert(key.clone(), entry).is_none() {
            inner.order.push_back(key);
        }
        if inner.entries.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                tracing::debug!(evicted = %fingerprint(&oldest), "cache over capacity");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Short stable digest of a cache key, so logs never carry names or birth data.
pub fn fingerprint(key: &str) -> String {
    let hash = blake3::hash(key.as_bytes());
    hash.to_hex()[..12].to_string()
}
