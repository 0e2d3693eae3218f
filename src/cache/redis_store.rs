use super::types::{StoreConnection, StoreConnector};
use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use std::net::Ipv6Addr;
use std::time::Duration;

pub struct RedisConnector {
    host: String,
    port: u16,
}

impl RedisConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn url(&self) -> String {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("redis://[{}]:{}/", self.host, self.port)
        } else {
            format!("redis://{}:{}/", self.host, self.port)
        }
    }
}

#[async_trait::async_trait]
impl StoreConnector for RedisConnector {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>> {
        let client = redis::Client::open(self.url()).context("Invalid cache address")?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .with_context(|| format!("Failed to connect to {}", self.describe()))?;
        Ok(Box::new(RedisConnection { conn }))
    }

    fn describe(&self) -> String {
        format!("redis {}:{}", self.host, self.port)
    }
}

// Multiplexed connections are cheap to clone; each call works on its own handle.
struct RedisConnection {
    conn: MultiplexedConnection,
}

#[async_trait::async_trait]
impl StoreConnection for RedisConnection {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
