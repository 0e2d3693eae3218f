use super::types::{StoreConnection, StoreConnector};
use anyhow::Result;
use moka::future::Cache;
use std::time::{Duration, Instant};

/// In-process store for single-instance deployments and tests. Every
/// "connection" shares the same entries, so reconnecting loses nothing.
pub struct MemoryConnector {
    // Key -> (Value, ValidUntil)
    cache: Cache<String, (String, Instant)>,
}

impl MemoryConnector {
    pub fn new(capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(capacity).build(),
        }
    }
}

#[async_trait::async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>> {
        Ok(Box::new(MemoryConnection {
            cache: self.cache.clone(),
        }))
    }

    fn describe(&self) -> String {
        "in-process store".to_string()
    }
}

struct MemoryConnection {
    cache: Cache<String, (String, Instant)>,
}

#[async_trait::async_trait]
impl StoreConnection for MemoryConnection {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.cache.get(key).await {
            Some((value, valid_until)) if Instant::now() < valid_until => Ok(Some(value)),
            Some(_) => {
                self.cache.invalidate(key).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let valid_until = Instant::now() + ttl;
        self.cache
            .insert(key.to_string(), (value.to_string(), valid_until))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entries_expire() {
        let connector = MemoryConnector::new(100);
        let conn = connector.connect().await.unwrap();

        conn.set_with_expiry("1.2.3.4", "success", Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(conn.get("1.2.3.4").await.unwrap().as_deref(), Some("success"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(conn.get("1.2.3.4").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reconnect_keeps_entries() {
        let connector = MemoryConnector::new(100);
        let first = connector.connect().await.unwrap();
        first
            .set_with_expiry("1.2.3.4", "failure", Duration::from_secs(60))
            .await
            .unwrap();

        let second = connector.connect().await.unwrap();
        assert_eq!(second.get("1.2.3.4").await.unwrap().as_deref(), Some("failure"));
    }
}
