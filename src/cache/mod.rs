pub mod memory;
pub mod redis_store;
pub mod supervisor;
pub mod types;

pub use self::memory::MemoryConnector;
pub use self::redis_store::RedisConnector;
pub use self::supervisor::{CacheHealth, ConnectionSupervisor, ReconnectPolicy};
pub use self::types::{StoreConnection, StoreConnector};

use crate::config::{CacheBackend, ScopeSettings};
use crate::engine::{ClientAddress, Verdict};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, warn};

const STORED_ALLOWED: &str = "success";
const STORED_BLOCKED: &str = "failure";

/// Result of reading a verdict. `Error` means the store could not answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Allowed,
    Blocked,
    Miss,
    Error,
}

pub fn create_connector(settings: &ScopeSettings) -> Arc<dyn StoreConnector> {
    match settings.cache_backend {
        CacheBackend::Redis => Arc::new(RedisConnector::new(
            settings.cache_host.clone(),
            settings.cache_port,
        )),
        CacheBackend::Memory => Arc::new(MemoryConnector::new(settings.cache_capacity)),
    }
}

/// Verdicts keyed by client address, stored with an expiry.
pub struct VerdictCache {
    supervisor: ConnectionSupervisor,
    ttl: Duration,
}

impl VerdictCache {
    pub fn new(supervisor: ConnectionSupervisor, ttl: Duration) -> Self {
        Self { supervisor, ttl }
    }

    pub fn from_settings(settings: &ScopeSettings, policy: ReconnectPolicy) -> Self {
        let supervisor = ConnectionSupervisor::new(
            create_connector(settings),
            policy,
            settings.cache_connect_timeout,
            settings.cache_read_timeout,
        );
        Self::new(supervisor, settings.cache_verdict_ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn ensure_connected(&self) -> CacheHealth {
        self.supervisor.ensure_connected().await
    }

    pub async fn get(&self, address: &ClientAddress) -> CacheLookup {
        let Some(conn) = self.supervisor.current() else {
            error!("Verdict lookup for {} without a cache connection", address);
            return CacheLookup::Error;
        };

        match timeout(self.supervisor.read_timeout(), conn.get(&address.cache_key())).await {
            Ok(Ok(Some(value))) => match value.as_str() {
                STORED_ALLOWED => CacheLookup::Allowed,
                STORED_BLOCKED => CacheLookup::Blocked,
                other => {
                    warn!("Ignoring unrecognized cached value {:?} for {}", other, address);
                    CacheLookup::Miss
                }
            },
            Ok(Ok(None)) => CacheLookup::Miss,
            Ok(Err(e)) => {
                error!("Cache read for {} failed: {}", address, e);
                CacheLookup::Error
            }
            Err(_) => {
                error!(
                    "Cache read for {} timed out after {:?}",
                    address,
                    self.supervisor.read_timeout()
                );
                CacheLookup::Error
            }
        }
    }

    pub async fn put(&self, address: &ClientAddress, verdict: Verdict) -> Result<()> {
        let conn = self
            .supervisor
            .current()
            .ok_or_else(|| anyhow!("no cache connection"))?;

        let value = match verdict {
            Verdict::Allowed => STORED_ALLOWED,
            Verdict::Blocked => STORED_BLOCKED,
        };

        timeout(
            self.supervisor.read_timeout(),
            conn.set_with_expiry(&address.cache_key(), value, self.ttl),
        )
        .await
        .map_err(|_| anyhow!("cache write timed out after {:?}", self.supervisor.read_timeout()))?
    }
}
