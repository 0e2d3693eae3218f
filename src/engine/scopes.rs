use super::orchestrator::DecisionEngine;
use std::sync::Arc;

/// Picks the engine for a request path: longest matching location prefix,
/// else the root scope.
pub struct ScopeRouter {
    root: Arc<DecisionEngine>,
    // Sorted by prefix length, longest first.
    locations: Vec<(String, Arc<DecisionEngine>)>,
}

impl ScopeRouter {
    pub fn new(root: DecisionEngine, locations: Vec<(String, DecisionEngine)>) -> Self {
        let mut locations: Vec<(String, Arc<DecisionEngine>)> = locations
            .into_iter()
            .map(|(prefix, engine)| (prefix, Arc::new(engine)))
            .collect();
        locations.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self {
            root: Arc::new(root),
            locations,
        }
    }

    pub fn select(&self, path: &str) -> &Arc<DecisionEngine> {
        self.locations
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, engine)| engine)
            .unwrap_or(&self.root)
    }

    pub fn root(&self) -> &Arc<DecisionEngine> {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ConnectionSupervisor, MemoryConnector, ReconnectPolicy, VerdictCache};
    use crate::config::ProxyConfig;
    use crate::engine::{
        AddressExtractor, EngineSettings, FcrdnsVerifier, IdentifierMatcher, ProviderRegistry,
        SharedComponents,
    };
    use crate::logger::DecisionLogger;
    use crate::resolver::DnsResolver;
    use crate::stats::VerifierStats;
    use anyhow::Result;
    use std::net::IpAddr;
    use std::time::Duration;

    struct NoDns;

    #[async_trait::async_trait]
    impl DnsResolver for NoDns {
        async fn reverse(&self, _address: IpAddr) -> Result<Option<String>> {
            Ok(None)
        }

        async fn forward(&self, _hostname: &str) -> Result<Vec<IpAddr>> {
            Ok(vec![])
        }
    }

    fn engine(shared: &SharedComponents, scope: &str) -> DecisionEngine {
        let supervisor = ConnectionSupervisor::new(
            Arc::new(MemoryConnector::new(10)),
            ReconnectPolicy::default(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        DecisionEngine::new(
            EngineSettings {
                scope: scope.to_string(),
                enabled: false,
                identity_header: "User-Agent".to_string(),
            },
            shared.clone(),
            VerdictCache::new(supervisor, Duration::from_secs(60)),
        )
    }

    #[test]
    fn test_longest_prefix_wins() {
        let registry = Arc::new(ProviderRegistry::builtin().unwrap());
        let shared = SharedComponents {
            extractor: Arc::new(AddressExtractor::new(&ProxyConfig::default())),
            matcher: Arc::new(IdentifierMatcher::new(&registry).unwrap()),
            verifier: Arc::new(
                FcrdnsVerifier::new(Arc::new(NoDns), registry, Duration::from_secs(1)).unwrap(),
            ),
            stats: VerifierStats::new(vec![]),
            decisions: DecisionLogger::disabled(),
        };

        let router = ScopeRouter::new(
            engine(&shared, "/"),
            vec![
                ("/api".to_string(), engine(&shared, "/api")),
                ("/api/public".to_string(), engine(&shared, "/api/public")),
            ],
        );

        let scope_of = |path: &str| router.select(path).settings().scope.clone();
        assert_eq!(scope_of("/api/public/feed"), "/api/public");
        assert_eq!(scope_of("/api/private"), "/api");
        assert_eq!(scope_of("/index.html"), "/");
        assert_eq!(router.root().settings().scope, "/");
    }
}
