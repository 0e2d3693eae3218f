use super::address::ClientAddress;
use super::registry::ProviderRegistry;
use crate::resolver::DnsResolver;
use anyhow::{Context, Result};
use regex::Regex;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Outcome of verification, and the value the verdict cache stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Blocked,
}

/// Why an address failed forward-confirmed reverse DNS.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("no reverse DNS record")]
    NoReverseRecord,

    #[error("no domain in hostname {0}")]
    NoRegistrableDomain(String),

    #[error("forward lookup of {0} failed")]
    ForwardLookupFailed(String),

    #[error("{0} does not resolve back to the client")]
    ForwardMismatch(String),

    #[error("unknown provider {0}")]
    UnknownProvider(String),

    #[error("{domain} is not a {provider} domain")]
    DomainNotRegistered { provider: String, domain: String },
}

/// Strips exactly one leading label: `crawl-1.googlebot.com` -> `googlebot.com`.
///
/// Not public-suffix aware; `a.example.co.uk` yields `example.co.uk` but
/// `example.co.uk` yields `co.uk`.
#[derive(Debug)]
pub struct DomainExtractor {
    pattern: Regex,
}

impl DomainExtractor {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(r"\.(.*)").context("Failed to compile domain pattern")?;
        Ok(Self { pattern })
    }

    pub fn extract<'a>(&self, hostname: &'a str) -> Option<&'a str> {
        self.pattern
            .captures(hostname)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|domain| !domain.is_empty())
    }
}

/// Forward-confirmed reverse DNS check of a claimed provider identity.
pub struct FcrdnsVerifier {
    resolver: Arc<dyn DnsResolver>,
    registry: Arc<ProviderRegistry>,
    domains: DomainExtractor,
    dns_timeout: Duration,
}

impl FcrdnsVerifier {
    pub fn new(
        resolver: Arc<dyn DnsResolver>,
        registry: Arc<ProviderRegistry>,
        dns_timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            resolver,
            registry,
            domains: DomainExtractor::new()?,
            dns_timeout,
        })
    }

    pub async fn verify(&self, address: ClientAddress, claimed_provider: &str) -> Verdict {
        match self.check(address, claimed_provider).await {
            Ok(hostname) => {
                info!(
                    "Verified {} as {} via {}",
                    address, claimed_provider, hostname
                );
                Verdict::Allowed
            }
            Err(rejection) => {
                info!(
                    "Rejected {} claiming {}: {}",
                    address, claimed_provider, rejection
                );
                Verdict::Blocked
            }
        }
    }

    /// Runs every step and returns the confirmed hostname.
    pub async fn check(
        &self,
        address: ClientAddress,
        claimed_provider: &str,
    ) -> Result<String, Rejection> {
        let ip = IpAddr::V4(address.ip());

        // 1. Reverse lookup
        let hostname = match timeout(self.dns_timeout, self.resolver.reverse(ip)).await {
            Ok(Ok(Some(name))) => normalize_hostname(&name),
            Ok(Ok(None)) => return Err(Rejection::NoReverseRecord),
            Ok(Err(e)) => {
                debug!("{}", e);
                return Err(Rejection::NoReverseRecord);
            }
            Err(_) => {
                debug!("Reverse lookup of {} timed out", ip);
                return Err(Rejection::NoReverseRecord);
            }
        };
        if hostname.is_empty() {
            return Err(Rejection::NoReverseRecord);
        }

        // 2. Domain suffix
        let domain = match self.domains.extract(&hostname) {
            Some(domain) => domain.to_string(),
            None => return Err(Rejection::NoRegistrableDomain(hostname)),
        };

        // 3. Forward confirmation
        let addresses = match timeout(self.dns_timeout, self.resolver.forward(&hostname)).await {
            Ok(Ok(addresses)) => addresses,
            Ok(Err(e)) => {
                debug!("{}", e);
                return Err(Rejection::ForwardLookupFailed(hostname));
            }
            Err(_) => {
                debug!("Forward lookup of {} timed out", hostname);
                return Err(Rejection::ForwardLookupFailed(hostname));
            }
        };
        if !addresses.contains(&ip) {
            return Err(Rejection::ForwardMismatch(hostname));
        }

        // 4. Provider ownership
        let provider = self
            .registry
            .lookup(claimed_provider)
            .ok_or_else(|| Rejection::UnknownProvider(claimed_provider.to_string()))?;
        if !provider.owns_domain(&domain) {
            return Err(Rejection::DomainNotRegistered {
                provider: provider.name().to_string(),
                domain,
            });
        }

        Ok(hostname)
    }
}

fn normalize_hostname(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}
