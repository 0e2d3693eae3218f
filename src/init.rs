//! Initialization helpers for the application startup.

use crate::cache::{ReconnectPolicy, VerdictCache};
use crate::config::{Config, ScopeSettings};
use crate::engine::{
    AddressExtractor, DecisionEngine, EngineSettings, FcrdnsVerifier, IdentifierMatcher,
    ProviderRegistry, ScopeRouter, SharedComponents,
};
use crate::logger::DecisionLogger;
use crate::resolver::DnsResolver;
use crate::stats::VerifierStats;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = config.logging.level.clone();

        // Suppress resolver and cache client internals unless explicitly enabled
        for noisy in ["hickory_resolver", "hickory_proto", "redis"] {
            if !filter.contains(noisy) {
                filter.push_str(&format!(",{}=off", noisy));
            }
        }

        tracing_subscriber::EnvFilter::new(filter)
    });

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

/// Builds the registry from config, failing fast on a bad table.
pub fn init_registry(config: &Config) -> Result<Arc<ProviderRegistry>> {
    let registry =
        ProviderRegistry::from_config(&config.providers).context("Invalid provider table")?;
    for provider in registry.all() {
        let mut domains: Vec<&str> = provider.domains().collect();
        domains.sort_unstable();
        info!("Trusted provider {}: {}", provider.name(), domains.join(", "));
    }
    Ok(Arc::new(registry))
}

/// Builds the components every scope shares.
pub fn init_shared(
    config: &Config,
    registry: Arc<ProviderRegistry>,
    resolver: Arc<dyn DnsResolver>,
    stats: Arc<VerifierStats>,
    decisions: Arc<DecisionLogger>,
) -> Result<SharedComponents> {
    let matcher = IdentifierMatcher::new(&registry)?;
    info!("Identifier pattern: {}", matcher.pattern());

    let verifier = FcrdnsVerifier::new(resolver, registry, config.dns.timeout())?;

    Ok(SharedComponents {
        extractor: Arc::new(AddressExtractor::new(&config.proxy)),
        matcher: Arc::new(matcher),
        verifier: Arc::new(verifier),
        stats,
        decisions,
    })
}

/// One engine per configured scope, each with its own cache connection.
pub fn init_scopes(config: &Config, shared: &SharedComponents) -> ScopeRouter {
    let root = build_engine("/", &config.root_settings(), shared);
    let locations = config
        .location_settings()
        .into_iter()
        .map(|(prefix, settings)| {
            let engine = build_engine(&prefix, &settings, shared);
            (prefix, engine)
        })
        .collect();
    ScopeRouter::new(root, locations)
}

fn build_engine(scope: &str, settings: &ScopeSettings, shared: &SharedComponents) -> DecisionEngine {
    info!(
        "Scope '{}': enabled={}, cache={:?} {}:{}, ttl={:?}",
        scope,
        settings.enabled,
        settings.cache_backend,
        settings.cache_host,
        settings.cache_port,
        settings.cache_verdict_ttl
    );
    DecisionEngine::new(
        EngineSettings {
            scope: scope.to_string(),
            enabled: settings.enabled,
            identity_header: settings.identity_header.clone(),
        },
        shared.clone(),
        VerdictCache::from_settings(settings, ReconnectPolicy::default()),
    )
}
