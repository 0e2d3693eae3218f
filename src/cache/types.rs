use anyhow::Result;
use std::time::Duration;

/// An open connection to a TTL-capable key/value store.
#[async_trait::async_trait]
pub trait StoreConnection: Send + Sync {
    /// Cheap round trip used as a health check.
    async fn ping(&self) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

/// Opens connections to a store; owned by the connection supervisor.
#[async_trait::async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>>;

    /// Human-readable target, for logs.
    fn describe(&self) -> String;
}
