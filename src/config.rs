use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stats: StatsConfig,

    #[serde(default)]
    pub dns: DnsConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Root scope. Locations inherit every field they leave unset.
    #[serde(default)]
    pub verifier: ScopeConfig,

    #[serde(default)]
    pub locations: Vec<LocationConfig>,

    /// Overrides the built-in provider table when non-empty.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_decisions")]
    pub log_decisions: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_enable")]
    pub enable: bool,
    #[serde(default = "default_log_interval")]
    pub log_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DnsConfig {
    /// `udp://` or `tcp://` URLs. Empty means the system resolver configuration.
    #[serde(default)]
    pub nameservers: Vec<String>,
    #[serde(default = "default_dns_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProxyConfig {
    #[serde(default)]
    pub trusted: Vec<IpAddr>,
    #[serde(default)]
    pub real_ip_header: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

/// Per-scope directives. `None` means "inherit".
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ScopeConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub cache_backend: Option<CacheBackend>,
    #[serde(default)]
    pub cache_host: Option<String>,
    #[serde(default)]
    pub cache_port: Option<u16>,
    #[serde(default)]
    pub cache_connect_timeout: Option<u64>,
    #[serde(default)]
    pub cache_read_timeout: Option<u64>,
    #[serde(default)]
    pub cache_verdict_ttl: Option<u64>,
    #[serde(default)]
    pub cache_capacity: Option<u64>,
    #[serde(default)]
    pub identity_header: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LocationConfig {
    pub prefix: String,
    #[serde(flatten)]
    pub scope: ScopeConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub domains: Vec<String>,
}

/// A scope with every directive resolved against its parents and the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeSettings {
    pub enabled: bool,
    pub cache_backend: CacheBackend,
    pub cache_host: String,
    pub cache_port: u16,
    pub cache_connect_timeout: Duration,
    pub cache_read_timeout: Duration,
    pub cache_verdict_ttl: Duration,
    pub cache_capacity: u64,
    pub identity_header: String,
}

// Defaults
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8089
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_log_decisions() -> bool {
    true
}
fn default_stats_enable() -> bool {
    true
}
fn default_log_interval() -> u64 {
    300
}
fn default_dns_timeout_ms() -> u64 {
    2000
}

const DEFAULT_ENABLED: bool = false;
const DEFAULT_CACHE_HOST: &str = "127.0.0.1";
const DEFAULT_CACHE_PORT: u16 = 6379;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 10;
const DEFAULT_VERDICT_TTL_SECS: u64 = 3600;
const DEFAULT_CACHE_CAPACITY: u64 = 100_000;
const DEFAULT_IDENTITY_HEADER: &str = "User-Agent";

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            logging: LoggingConfig::default(),
            stats: StatsConfig::default(),
            dns: DnsConfig::default(),
            proxy: ProxyConfig::default(),
            verifier: ScopeConfig::default(),
            locations: vec![],
            providers: vec![],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_decisions: default_log_decisions(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enable: default_stats_enable(),
            log_interval_seconds: default_log_interval(),
        }
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            nameservers: vec![],
            timeout_ms: default_dns_timeout_ms(),
        }
    }
}

impl DnsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ScopeConfig {
    /// Fills every unset directive of `self` from `parent`.
    pub fn merge(&self, parent: &ScopeConfig) -> ScopeConfig {
        ScopeConfig {
            enabled: self.enabled.or(parent.enabled),
            cache_backend: self.cache_backend.or(parent.cache_backend),
            cache_host: self.cache_host.clone().or_else(|| parent.cache_host.clone()),
            cache_port: self.cache_port.or(parent.cache_port),
            cache_connect_timeout: self.cache_connect_timeout.or(parent.cache_connect_timeout),
            cache_read_timeout: self.cache_read_timeout.or(parent.cache_read_timeout),
            cache_verdict_ttl: self.cache_verdict_ttl.or(parent.cache_verdict_ttl),
            cache_capacity: self.cache_capacity.or(parent.cache_capacity),
            identity_header: self
                .identity_header
                .clone()
                .or_else(|| parent.identity_header.clone()),
        }
    }

    pub fn resolve(&self) -> ScopeSettings {
        ScopeSettings {
            enabled: self.enabled.unwrap_or(DEFAULT_ENABLED),
            cache_backend: self.cache_backend.unwrap_or(CacheBackend::Redis),
            cache_host: self
                .cache_host
                .clone()
                .unwrap_or_else(|| DEFAULT_CACHE_HOST.to_string()),
            cache_port: self.cache_port.unwrap_or(DEFAULT_CACHE_PORT),
            cache_connect_timeout: Duration::from_secs(
                self.cache_connect_timeout
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
            cache_read_timeout: Duration::from_secs(
                self.cache_read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
            ),
            cache_verdict_ttl: Duration::from_secs(
                self.cache_verdict_ttl.unwrap_or(DEFAULT_VERDICT_TTL_SECS),
            ),
            cache_capacity: self.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
            identity_header: self
                .identity_header
                .clone()
                .unwrap_or_else(|| DEFAULT_IDENTITY_HEADER.to_string()),
        }
    }

    fn validate(&self, scope: &str) -> Result<()> {
        let checks = [
            ("cache_port", self.cache_port.map(u64::from)),
            ("cache_connect_timeout", self.cache_connect_timeout),
            ("cache_read_timeout", self.cache_read_timeout),
            ("cache_verdict_ttl", self.cache_verdict_ttl),
            ("cache_capacity", self.cache_capacity),
        ];
        for (name, value) in checks {
            if value == Some(0) {
                bail!("{} must be greater than zero in scope '{}'", name, scope);
            }
        }
        if let Some(header) = &self.identity_header {
            if header.trim().is_empty() {
                bail!("identity_header cannot be empty in scope '{}'", scope);
            }
        }
        Ok(())
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dns.timeout_ms == 0 {
            bail!("dns.timeout_ms must be greater than zero");
        }

        self.verifier.validate("root")?;

        let mut seen = Vec::with_capacity(self.locations.len());
        for location in &self.locations {
            if !location.prefix.starts_with('/') {
                bail!(
                    "location prefix must start with '/', got '{}'",
                    location.prefix
                );
            }
            if seen.contains(&location.prefix.as_str()) {
                bail!("duplicate location prefix '{}'", location.prefix);
            }
            seen.push(location.prefix.as_str());
            location.scope.validate(&location.prefix)?;
        }
        Ok(())
    }

    pub fn root_settings(&self) -> ScopeSettings {
        self.verifier.resolve()
    }

    /// Resolved settings for every location, in configuration order.
    pub fn location_settings(&self) -> Vec<(String, ScopeSettings)> {
        self.locations
            .iter()
            .map(|loc| {
                (
                    loc.prefix.clone(),
                    loc.scope.merge(&self.verifier).resolve(),
                )
            })
            .collect()
    }
}
