use super::traits::RequestContext;
use crate::config::ProxyConfig;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Canonical client address. Only IPv4 is verified; see [`AddressError::Unsupported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientAddress(Ipv4Addr);

impl ClientAddress {
    pub fn ip(&self) -> Ipv4Addr {
        self.0
    }

    /// Key under which the verdict for this address is stored.
    pub fn cache_key(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for ClientAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Ipv4Addr> for ClientAddress {
    fn from(ip: Ipv4Addr) -> Self {
        Self(ip)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddressError {
    #[error("connection has no peer address")]
    NoPeer,

    #[error("malformed forwarded address: {0:?}")]
    Malformed(String),

    #[error("IPv6 client {0} is not verified")]
    Unsupported(IpAddr),
}

pub struct AddressExtractor {
    trusted: Vec<IpAddr>,
    real_ip_header: Option<String>,
}

impl AddressExtractor {
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            trusted: config.trusted.iter().map(canonical_ip).collect(),
            real_ip_header: config
                .real_ip_header
                .as_ref()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty()),
        }
    }

    pub fn extract<C: RequestContext + ?Sized>(&self, ctx: &C) -> Result<ClientAddress, AddressError> {
        let peer = canonical_ip(&ctx.peer_addr().ok_or(AddressError::NoPeer)?);

        let client = match &self.real_ip_header {
            Some(header) if self.is_trusted(&peer) => match ctx.header(header) {
                Some(value) => self.forwarded_client(value)?.unwrap_or(peer),
                None => peer,
            },
            _ => peer,
        };

        match client {
            IpAddr::V4(v4) => Ok(ClientAddress(v4)),
            IpAddr::V6(_) => Err(AddressError::Unsupported(client)),
        }
    }

    fn is_trusted(&self, ip: &IpAddr) -> bool {
        self.trusted.contains(ip)
    }

    // Walks a comma-separated list from the right, skipping our own proxies.
    fn forwarded_client(&self, value: &str) -> Result<Option<IpAddr>, AddressError> {
        let mut last = None;
        for hop in value.rsplit(',') {
            let hop = hop.trim();
            if hop.is_empty() {
                continue;
            }
            let ip = hop
                .parse::<IpAddr>()
                .map(|ip| canonical_ip(&ip))
                .map_err(|_| AddressError::Malformed(hop.to_string()))?;
            if !self.is_trusted(&ip) {
                return Ok(Some(ip));
            }
            last = Some(ip);
        }
        Ok(last)
    }
}

fn canonical_ip(ip: &IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => *ip,
        },
        IpAddr::V4(_) => *ip,
    }
}
