use super::types::{StoreConnection, StoreConnector};
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

/// How hard a single request may try to repair a broken connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts_per_request: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts_per_request: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheHealth {
    Connected,
    Disconnected,
}

/// Owns the process-wide connection for one scope: created lazily, replaced
/// only after a failed health check.
pub struct ConnectionSupervisor {
    connector: Arc<dyn StoreConnector>,
    current: ArcSwapOption<Box<dyn StoreConnection>>,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl ConnectionSupervisor {
    pub fn new(
        connector: Arc<dyn StoreConnector>,
        policy: ReconnectPolicy,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            current: ArcSwapOption::empty(),
            policy,
            connect_timeout,
            read_timeout,
        }
    }

    pub fn current(&self) -> Option<Arc<Box<dyn StoreConnection>>> {
        self.current.load_full()
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub async fn ensure_connected(&self) -> CacheHealth {
        match self.current.load_full() {
            Some(conn) => match timeout(self.read_timeout, conn.ping()).await {
                Ok(Ok(())) => return CacheHealth::Connected,
                Ok(Err(e)) => error!("Cache connection error: {}", e),
                Err(_) => error!(
                    "Cache connection error: health check timed out after {:?}",
                    self.read_timeout
                ),
            },
            None => info!(
                "No cache connection, creating new connection to {}",
                self.connector.describe()
            ),
        }

        for attempt in 1..=self.policy.max_attempts_per_request {
            match timeout(self.connect_timeout, self.connector.connect()).await {
                Ok(Ok(conn)) => {
                    self.current.store(Some(Arc::new(conn)));
                    info!("Cache connection established to {}", self.connector.describe());
                    return CacheHealth::Connected;
                }
                Ok(Err(e)) => error!(
                    "Cache connect attempt {} to {} failed: {}",
                    attempt,
                    self.connector.describe(),
                    e
                ),
                Err(_) => error!(
                    "Cache connect attempt {} to {} timed out after {:?}",
                    attempt,
                    self.connector.describe(),
                    self.connect_timeout
                ),
            }
        }

        error!("Unable to establish cache connection, bypassing");
        self.current.store(None);
        CacheHealth::Disconnected
    }
}
