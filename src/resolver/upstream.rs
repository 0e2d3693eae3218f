use super::types::DnsResolver;
use anyhow::Result;
use hickory_resolver::TokioResolver;
use std::net::IpAddr;
use tracing::debug;

pub struct UpstreamResolver {
    resolver: TokioResolver,
}

impl UpstreamResolver {
    pub fn new(resolver: TokioResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait::async_trait]
impl DnsResolver for UpstreamResolver {
    async fn reverse(&self, address: IpAddr) -> Result<Option<String>> {
        match self.resolver.reverse_lookup(address).await {
            Ok(lookup) => Ok(lookup.iter().next().map(|ptr| ptr.to_string())),
            Err(e) if e.is_no_records_found() => {
                debug!("No PTR record for {}", address);
                Ok(None)
            }
            Err(e) => Err(anyhow::anyhow!("Reverse lookup failed for {}: {}", address, e)),
        }
    }

    async fn forward(&self, hostname: &str) -> Result<Vec<IpAddr>> {
        match self.resolver.lookup_ip(hostname).await {
            Ok(lookup) => Ok(lookup.iter().collect()),
            Err(e) if e.is_no_records_found() => {
                debug!("No address records for {}", hostname);
                Ok(vec![])
            }
            Err(e) => Err(anyhow::anyhow!("Forward lookup failed for {}: {}", hostname, e)),
        }
    }
}
