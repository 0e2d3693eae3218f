use anyhow::Result;
use std::net::IpAddr;

/// Abstract DNS capability for mocking and switching implementations.
///
/// Implementations do not apply their own deadline; callers bound each call.
#[async_trait::async_trait]
pub trait DnsResolver: Send + Sync {
    /// PTR lookup. `Ok(None)` when the address has no reverse record.
    async fn reverse(&self, address: IpAddr) -> Result<Option<String>>;

    /// A/AAAA lookup of `hostname`.
    async fn forward(&self, hostname: &str) -> Result<Vec<IpAddr>>;
}
