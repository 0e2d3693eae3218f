use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{self, Duration};
use tracing::info;

// The last slot is reserved for "Other": unknown names and providers past it.
const MAX_PROVIDERS: usize = 32;
const OTHER_SLOT: usize = MAX_PROVIDERS - 1;

#[derive(Debug)]
pub struct VerifierStats {
    requests: AtomicU64,
    allowed: AtomicU64,
    denied: AtomicU64,
    bypassed: AtomicU64,

    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_errors: AtomicU64,
    cache_write_failures: AtomicU64,

    verifications: AtomicU64,
    verifications_passed: AtomicU64,
    verifications_failed: AtomicU64,

    // Fixed array of counters keyed by registry index, lock-free.
    claims_by_provider: [AtomicU64; MAX_PROVIDERS],
    provider_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub allowed: u64,
    pub denied: u64,
    pub bypassed: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_errors: u64,
    pub cache_write_failures: u64,
    pub verifications: u64,
    pub verifications_passed: u64,
    pub verifications_failed: u64,
    pub claims_by_provider: Vec<(String, u64)>,
}

impl VerifierStats {
    pub fn new(provider_names: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            requests: AtomicU64::new(0),
            allowed: AtomicU64::new(0),
            denied: AtomicU64::new(0),
            bypassed: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_errors: AtomicU64::new(0),
            cache_write_failures: AtomicU64::new(0),
            verifications: AtomicU64::new(0),
            verifications_passed: AtomicU64::new(0),
            verifications_failed: AtomicU64::new(0),
            claims_by_provider: [0; MAX_PROVIDERS].map(|_| AtomicU64::new(0)),
            provider_names,
        })
    }

    /// Spawns the periodic stats dump. Requires a running tokio runtime.
    pub fn spawn_reporter(self: &Arc<Self>, log_interval_sec: u64) {
        let stats = self.clone();
        let log_interval = Duration::from_secs(log_interval_sec.max(1));
        tokio::spawn(async move {
            stats.run_logger(log_interval).await;
        });
    }

    pub fn inc_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_allowed(&self) {
        self.allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bypassed(&self) {
        self.bypassed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_error(&self) {
        self.cache_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_write_failure(&self) {
        self.cache_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_claim(&self, provider: &str) {
        let idx = self
            .provider_names
            .iter()
            .position(|name| name == provider)
            .filter(|&idx| idx < OTHER_SLOT)
            .unwrap_or(OTHER_SLOT);
        self.claims_by_provider[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_verification(&self, passed: bool) {
        self.verifications.fetch_add(1, Ordering::Relaxed);
        if passed {
            self.verifications_passed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.verifications_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_snapshot(&self) -> StatsSnapshot {
        let claims_by_provider = (0..MAX_PROVIDERS)
            .filter_map(|i| {
                let count = self.claims_by_provider[i].load(Ordering::Relaxed);
                if count == 0 {
                    return None;
                }
                let name = self
                    .provider_names
                    .get(i)
                    .filter(|_| i < OTHER_SLOT)
                    .cloned()
                    .unwrap_or_else(|| "Other".to_string());
                Some((name, count))
            })
            .collect();

        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            allowed: self.allowed.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
            verifications: self.verifications.load(Ordering::Relaxed),
            verifications_passed: self.verifications_passed.load(Ordering::Relaxed),
            verifications_failed: self.verifications_failed.load(Ordering::Relaxed),
            claims_by_provider,
        }
    }

    async fn run_logger(&self, log_interval: Duration) {
        let mut interval = time::interval(log_interval);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.dump_stats();
        }
    }

    fn dump_stats(&self) {
        let snap = self.get_snapshot();
        let pct = |n: u64| {
            if snap.requests > 0 {
                (n as f64 / snap.requests as f64) * 100.0
            } else {
                0.0
            }
        };

        let mut claim_stats = String::new();
        for (name, count) in &snap.claims_by_provider {
            claim_stats.push_str(&format!("[{}: {}] ", name, count));
        }

        info!(
            "STATS DUMP: Requests: {}, Allowed: {} ({:.1}%), Denied: {} ({:.1}%), Bypassed: {} ({:.1}%), CacheHits: {}, CacheErrors: {}, Verifications: {} ({} passed), Claims: {}",
            snap.requests,
            snap.allowed,
            pct(snap.allowed),
            snap.denied,
            pct(snap.denied),
            snap.bypassed,
            pct(snap.bypassed),
            snap.cache_hits,
            snap.cache_errors,
            snap.verifications,
            snap.verifications_passed,
            claim_stats
        );
    }
}
