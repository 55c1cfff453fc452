use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::bucket::TokenBucket;

/// Default sustained admission rate, in tokens per second.
pub const DEFAULT_RATE_PER_SEC: f64 = 2.0;

/// Default burst capacity of each client's bucket.
pub const DEFAULT_BURST: u32 = 4;

/// Default period between eviction passes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Default inactivity span after which a client's entry is evicted.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Settings shared by a [`ClientRegistry`] and the sweeper pruning it.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Tokens added to every bucket per second.
    pub rate_per_sec: f64,
    /// Maximum tokens a bucket holds, i.e. the largest instantaneous burst.
    pub burst: u32,
    /// How often the eviction sweeper wakes.
    pub sweep_interval: Duration,
    /// How long a client may stay idle before its entry is reclaimed.
    pub idle_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: DEFAULT_RATE_PER_SEC,
            burst: DEFAULT_BURST,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Per-client state: the client's bucket and when it was last heard from.
#[derive(Debug)]
struct ClientEntry {
    limiter: Arc<Mutex<TokenBucket>>,
    last_seen: Instant,
}

/// Concurrency-safe map from client address to that client's limiter.
///
/// Shared between the request path (every admission decision) and the
/// eviction sweeper. Each operation runs under one critical section on the
/// map, so concurrent first requests for the same address cannot race two
/// entries into existence and a sweep observes a consistent snapshot.
pub struct ClientRegistry {
    clients: Mutex<HashMap<IpAddr, ClientEntry>>,
    config: GateConfig,
}

impl ClientRegistry {
    /// Registry with the default [`GateConfig`].
    pub fn new() -> Self {
        Self::with_config(GateConfig::default())
    }

    /// Registry with custom settings (tests compress the timescales).
    pub fn with_config(config: GateConfig) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Fetch the limiter for `addr`, creating a fresh full bucket on first
    /// sight, and refresh the entry's last-seen timestamp.
    ///
    /// The handle stays valid after the entry is evicted; the next call for
    /// the same address starts over with a new bucket.
    pub fn get_or_create(&self, addr: IpAddr) -> Arc<Mutex<TokenBucket>> {
        self.get_or_create_at(addr, Instant::now())
    }

    /// Clock-explicit form of [`get_or_create`](Self::get_or_create).
    pub fn get_or_create_at(&self, addr: IpAddr, now: Instant) -> Arc<Mutex<TokenBucket>> {
        let mut clients = self.clients.lock();
        let entry = clients.entry(addr).or_insert_with(|| ClientEntry {
            limiter: Arc::new(Mutex::new(TokenBucket::new(
                self.config.burst,
                self.config.rate_per_sec,
            ))),
            last_seen: now,
        });
        // last-seen only ever moves forward, even if callers' clock readings
        // arrive out of order
        entry.last_seen = entry.last_seen.max(now);
        Arc::clone(&entry.limiter)
    }

    /// Remove every entry idle strictly longer than `max_idle` and return how
    /// many were dropped. All ages are measured against one reference time.
    pub fn sweep(&self, max_idle: Duration) -> usize {
        self.sweep_at(max_idle, Instant::now())
    }

    /// Clock-explicit form of [`sweep`](Self::sweep).
    pub fn sweep_at(&self, max_idle: Duration, now: Instant) -> usize {
        let mut clients = self.clients.lock();
        let before = clients.len();
        // duration_since saturates to zero, so entries touched after `now`
        // are never candidates
        clients.retain(|_, entry| now.duration_since(entry.last_seen) <= max_idle);
        before - clients.len()
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    /// Whether no client is currently tracked.
    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    /// The settings this registry was built with.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
