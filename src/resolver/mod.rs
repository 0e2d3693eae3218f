pub mod types;
pub mod upstream;

use crate::config::DnsConfig;
use anyhow::{bail, Context, Result};
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{Resolver, TokioResolver};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use url::Url;

pub use self::types::DnsResolver;
pub use self::upstream::UpstreamResolver;

pub fn create_resolver(config: &DnsConfig) -> Result<Arc<dyn DnsResolver>> {
    let mut opts = ResolverOpts::default();
    opts.timeout = config.timeout();
    // Verdicts are cached downstream; always ask upstream.
    opts.cache_size = 0;

    let builder = if config.nameservers.is_empty() {
        info!("No nameservers configured, using system resolver configuration.");
        TokioResolver::builder_tokio().context("Failed to read system resolver configuration")?
    } else {
        let mut resolver_config = ResolverConfig::new();
        for (idx, nameserver) in config.nameservers.iter().enumerate() {
            let ns_cfg = parse_nameserver(nameserver)?;
            info!(
                "Added nameserver: [{}] {} ({})",
                idx, nameserver, ns_cfg.socket_addr
            );
            resolver_config.add_name_server(ns_cfg);
        }
        Resolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
    };

    let resolver = builder.with_options(opts).build();
    Ok(Arc::new(UpstreamResolver::new(resolver)) as Arc<dyn DnsResolver>)
}

fn parse_nameserver(nameserver: &str) -> Result<NameServerConfig> {
    let url = Url::parse(nameserver).context("Failed to parse nameserver URL")?;

    let protocol = match url.scheme() {
        "udp" => Protocol::Udp,
        "tcp" => Protocol::Tcp,
        other => bail!("Unsupported nameserver scheme '{}' in {}", other, nameserver),
    };

    let host = url
        .host_str()
        .context("Nameserver URL has no host")?
        .trim_start_matches('[')
        .trim_end_matches(']');
    let ip = host
        .parse()
        .with_context(|| format!("Nameserver host must be an IP address: {}", host))?;
    let port = url.port().unwrap_or(53);

    Ok(NameServerConfig::new(SocketAddr::new(ip, port), protocol))
}
