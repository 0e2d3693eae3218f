use bot_verifier::cache::{
    ConnectionSupervisor, ReconnectPolicy, StoreConnection, StoreConnector, VerdictCache,
};
use bot_verifier::config::ProxyConfig;
use bot_verifier::engine::{
    AddressExtractor, DecisionEngine, DecisionSource, EngineSettings, FcrdnsVerifier,
    IdentifierMatcher, Outcome, ProviderRegistry, RequestContext, SharedComponents,
};
use bot_verifier::logger::DecisionLogger;
use bot_verifier::resolver::DnsResolver;
use bot_verifier::stats::VerifierStats;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// --- Mocks ---

#[derive(Default)]
struct MockResolver {
    ptr: HashMap<IpAddr, String>,
    forward: HashMap<String, Vec<IpAddr>>,
    reverse_calls: AtomicUsize,
    forward_calls: AtomicUsize,
}

impl MockResolver {
    fn with_ptr(mut self, ip: &str, host: &str) -> Self {
        self.ptr.insert(ip.parse().unwrap(), host.to_string());
        self
    }

    fn with_forward(mut self, host: &str, ips: &[&str]) -> Self {
        self.forward.insert(
            host.to_string(),
            ips.iter().map(|ip| ip.parse().unwrap()).collect(),
        );
        self
    }

    fn dns_calls(&self) -> usize {
        self.reverse_calls.load(Ordering::SeqCst) + self.forward_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DnsResolver for MockResolver {
    async fn reverse(&self, ip: IpAddr) -> anyhow::Result<Option<String>> {
        self.reverse_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ptr.get(&ip).cloned())
    }

    async fn forward(&self, hostname: &str) -> anyhow::Result<Vec<IpAddr>> {
        self.forward_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.forward.get(hostname).cloned().unwrap_or_default())
    }
}

#[derive(Default, Clone, Copy)]
enum ReadBehaviour {
    #[default]
    Normal,
    Fail,
    Hang,
}

#[derive(Default)]
struct MockStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    writes: Arc<AtomicUsize>,
    unreachable: bool,
    reads: ReadBehaviour,
    fail_writes: bool,
}

impl MockStore {
    fn preload(self, key: &str, value: &str) -> Self {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self
    }

    fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

struct MockConnection {
    entries: Arc<Mutex<HashMap<String, String>>>,
    writes: Arc<AtomicUsize>,
    reads: ReadBehaviour,
    fail_writes: bool,
}

#[async_trait::async_trait]
impl StoreConnection for MockConnection {
    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        match self.reads {
            ReadBehaviour::Normal => Ok(self.entries.lock().unwrap().get(key).cloned()),
            ReadBehaviour::Fail => anyhow::bail!("READONLY You can't read against a broken replica"),
            ReadBehaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(None)
            }
        }
    }

    async fn set_with_expiry(&self, key: &str, value: &str, _ttl: Duration) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            anyhow::bail!("OOM command not allowed when used memory > 'maxmemory'");
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[async_trait::async_trait]
impl StoreConnector for MockStore {
    async fn connect(&self) -> anyhow::Result<Box<dyn StoreConnection>> {
        if self.unreachable {
            anyhow::bail!("connection refused");
        }
        Ok(Box::new(MockConnection {
            entries: self.entries.clone(),
            writes: self.writes.clone(),
            reads: self.reads,
            fail_writes: self.fail_writes,
        }))
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

struct TestRequest {
    peer: Option<IpAddr>,
    headers: Vec<(&'static str, &'static str)>,
}

impl TestRequest {
    fn from(peer: &str) -> Self {
        Self {
            peer: Some(peer.parse().unwrap()),
            headers: vec![],
        }
    }

    fn user_agent(mut self, value: &'static str) -> Self {
        self.headers.push(("User-Agent", value));
        self
    }
}

impl RequestContext for TestRequest {
    fn peer_addr(&self) -> Option<IpAddr> {
        self.peer
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }
}

// --- Helpers ---

const GOOGLEBOT_UA: &str =
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

fn build_engine(
    registry: ProviderRegistry,
    resolver: Arc<MockResolver>,
    store: Arc<MockStore>,
) -> DecisionEngine {
    build_engine_with_stats(registry, resolver, store).0
}

fn build_engine_with_stats(
    registry: ProviderRegistry,
    resolver: Arc<MockResolver>,
    store: Arc<MockStore>,
) -> (DecisionEngine, Arc<VerifierStats>) {
    let registry = Arc::new(registry);
    let names = registry.all().iter().map(|p| p.name().to_string()).collect();
    let stats = VerifierStats::new(names);
    let shared = SharedComponents {
        extractor: Arc::new(AddressExtractor::new(&ProxyConfig::default())),
        matcher: Arc::new(IdentifierMatcher::new(&registry).unwrap()),
        verifier: Arc::new(
            FcrdnsVerifier::new(resolver, registry, Duration::from_secs(1)).unwrap(),
        ),
        stats: stats.clone(),
        decisions: DecisionLogger::disabled(),
    };
    let supervisor = ConnectionSupervisor::new(
        store,
        ReconnectPolicy::default(),
        Duration::from_secs(1),
        Duration::from_secs(1),
    );
    let engine = DecisionEngine::new(
        EngineSettings {
            scope: "/".to_string(),
            enabled: true,
            identity_header: "User-Agent".to_string(),
        },
        shared,
        VerdictCache::new(supervisor, Duration::from_secs(3600)),
    );
    (engine, stats)
}

// --- Tests ---

#[tokio::test]
async fn test_absent_claim_allows_without_cache_write() {
    let resolver = Arc::new(MockResolver::default());
    let store = Arc::new(MockStore::default());
    let engine = build_engine(
        ProviderRegistry::builtin().unwrap(),
        resolver.clone(),
        store.clone(),
    );

    let decision = engine.decide(&TestRequest::from("203.0.113.7")).await;
    assert_eq!(decision.outcome, Outcome::Allow);
    assert_eq!(decision.source, DecisionSource::NoClaim);

    let decision = engine
        .decide(&TestRequest::from("203.0.113.7").user_agent("curl/8.4.0"))
        .await;
    assert_eq!(decision.outcome, Outcome::Allow);

    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    assert_eq!(resolver.dns_calls(), 0);
}

#[tokio::test]
async fn test_cached_verdicts_skip_dns() {
    let resolver = Arc::new(MockResolver::default());
    let store = Arc::new(
        MockStore::default()
            .preload("66.249.66.1", "success")
            .preload("198.51.100.9", "failure"),
    );
    let engine = build_engine(
        ProviderRegistry::builtin().unwrap(),
        resolver.clone(),
        store.clone(),
    );

    let allowed = engine
        .decide(&TestRequest::from("66.249.66.1").user_agent(GOOGLEBOT_UA))
        .await;
    assert_eq!(allowed.outcome, Outcome::Allow);
    assert_eq!(allowed.source, DecisionSource::Cache);

    // A cached failure blocks the address whatever it claims now
    let blocked = engine
        .decide(&TestRequest::from("198.51.100.9").user_agent("Mozilla/5.0 Firefox/120.0"))
        .await;
    assert_eq!(blocked.outcome, Outcome::Deny);
    assert_eq!(blocked.source, DecisionSource::Cache);

    assert_eq!(resolver.dns_calls(), 0);
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unreachable_cache_never_denies() {
    let resolver = Arc::new(MockResolver::default());
    let store = Arc::new(MockStore {
        unreachable: true,
        ..Default::default()
    });
    let engine = build_engine(
        ProviderRegistry::builtin().unwrap(),
        resolver.clone(),
        store.clone(),
    );

    for _ in 0..3 {
        let decision = engine
            .decide(&TestRequest::from("198.51.100.9").user_agent(GOOGLEBOT_UA))
            .await;
        assert_eq!(decision.outcome, Outcome::Continue);
        assert_eq!(decision.source, DecisionSource::CacheUnavailable);
    }
    assert_eq!(resolver.dns_calls(), 0);
}

#[tokio::test]
async fn test_missing_ptr_denies_then_serves_from_cache() {
    let resolver = Arc::new(MockResolver::default());
    let store = Arc::new(MockStore::default());
    let engine = build_engine(
        ProviderRegistry::builtin().unwrap(),
        resolver.clone(),
        store.clone(),
    );

    let request = TestRequest::from("198.51.100.9").user_agent(GOOGLEBOT_UA);

    let first = engine.decide(&request).await;
    assert_eq!(first.outcome, Outcome::Deny);
    assert_eq!(first.source, DecisionSource::Verification);
    assert_eq!(store.value("198.51.100.9").as_deref(), Some("failure"));
    assert_eq!(resolver.reverse_calls.load(Ordering::SeqCst), 1);

    let second = engine.decide(&request).await;
    assert_eq!(second.outcome, Outcome::Deny);
    assert_eq!(second.source, DecisionSource::Cache);
    assert_eq!(resolver.reverse_calls.load(Ordering::SeqCst), 1);
    assert_eq!(resolver.forward_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_verified_googlebot_is_cached() {
    let resolver = Arc::new(
        MockResolver::default()
            .with_ptr("66.249.66.1", "crawl-66-249-66-1.googlebot.com.")
            .with_forward("crawl-66-249-66-1.googlebot.com", &["66.249.66.1"]),
    );
    let store = Arc::new(MockStore::default());
    let engine = build_engine(
        ProviderRegistry::builtin().unwrap(),
        resolver.clone(),
        store.clone(),
    );

    let request = TestRequest::from("66.249.66.1").user_agent(GOOGLEBOT_UA);
    let first = engine.decide(&request).await;
    assert_eq!(first.outcome, Outcome::Allow);
    assert_eq!(first.source, DecisionSource::Verification);
    assert_eq!(store.value("66.249.66.1").as_deref(), Some("success"));

    // Idempotent while the verdict is cached
    let calls = resolver.dns_calls();
    for _ in 0..3 {
        let again = engine.decide(&request).await;
        assert_eq!(again.outcome, Outcome::Allow);
        assert_eq!(again.source, DecisionSource::Cache);
    }
    assert_eq!(resolver.dns_calls(), calls);
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_forward_confirmation_decides_baidu_claim() {
    let registry = ProviderRegistry::new([("Baidu", vec!["baidu.com"])]).unwrap();

    let confirmed = Arc::new(
        MockResolver::default()
            .with_ptr("180.76.15.10", "crawl.baidu.com")
            .with_forward("crawl.baidu.com", &["180.76.15.9", "180.76.15.10"]),
    );
    let engine = build_engine(
        registry,
        confirmed.clone(),
        Arc::new(MockStore::default()),
    );
    let decision = engine
        .decide(&TestRequest::from("180.76.15.10").user_agent("Baiduspider/2.0"))
        .await;
    assert_eq!(decision.outcome, Outcome::Allow);

    // Domain matches but the forward set does not contain the client
    let registry = ProviderRegistry::new([("Baidu", vec!["baidu.com"])]).unwrap();
    let mismatched = Arc::new(
        MockResolver::default()
            .with_ptr("180.76.15.10", "crawl.baidu.com")
            .with_forward("crawl.baidu.com", &["180.76.15.9"]),
    );
    let engine = build_engine(
        registry,
        mismatched.clone(),
        Arc::new(MockStore::default()),
    );
    let decision = engine
        .decide(&TestRequest::from("180.76.15.10").user_agent("Baiduspider/2.0"))
        .await;
    assert_eq!(decision.outcome, Outcome::Deny);
}

#[tokio::test]
async fn test_spoofed_domain_is_denied() {
    // Forward-confirms, but under a domain no provider owns
    let resolver = Arc::new(
        MockResolver::default()
            .with_ptr("203.0.113.50", "crawl.googlebot.com.evil.example")
            .with_forward("crawl.googlebot.com.evil.example", &["203.0.113.50"]),
    );
    let engine = build_engine(
        ProviderRegistry::builtin().unwrap(),
        resolver,
        Arc::new(MockStore::default()),
    );
    let decision = engine
        .decide(&TestRequest::from("203.0.113.50").user_agent(GOOGLEBOT_UA))
        .await;
    assert_eq!(decision.outcome, Outcome::Deny);
}

#[tokio::test]
async fn test_ipv6_client_bypasses() {
    let resolver = Arc::new(MockResolver::default());
    let store = Arc::new(MockStore::default());
    let engine = build_engine(
        ProviderRegistry::builtin().unwrap(),
        resolver.clone(),
        store.clone(),
    );

    let decision = engine
        .decide(&TestRequest::from("2001:db8::1").user_agent(GOOGLEBOT_UA))
        .await;
    assert_eq!(decision.outcome, Outcome::Continue);
    assert_eq!(decision.source, DecisionSource::NoAddress);
    assert_eq!(resolver.dns_calls(), 0);
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cache_read_failure_bypasses() {
    for reads in [ReadBehaviour::Fail, ReadBehaviour::Hang] {
        let resolver = Arc::new(MockResolver::default());
        let store = Arc::new(MockStore {
            reads,
            ..Default::default()
        });
        let (engine, stats) = build_engine_with_stats(
            ProviderRegistry::builtin().unwrap(),
            resolver.clone(),
            store.clone(),
        );

        let decision = engine
            .decide(&TestRequest::from("198.51.100.9").user_agent(GOOGLEBOT_UA))
            .await;
        assert_eq!(decision.outcome, Outcome::Continue);
        assert_eq!(decision.source, DecisionSource::CacheError);
        assert_eq!(resolver.dns_calls(), 0);
        assert_eq!(stats.get_snapshot().cache_errors, 1);
        assert_eq!(stats.get_snapshot().bypassed, 1);
    }
}

#[tokio::test]
async fn test_failed_write_keeps_verdict() {
    let resolver = Arc::new(MockResolver::default());
    let store = Arc::new(MockStore {
        fail_writes: true,
        ..Default::default()
    });
    let (engine, stats) = build_engine_with_stats(
        ProviderRegistry::builtin().unwrap(),
        resolver.clone(),
        store.clone(),
    );

    let decision = engine
        .decide(&TestRequest::from("198.51.100.9").user_agent(GOOGLEBOT_UA))
        .await;
    assert_eq!(decision.outcome, Outcome::Deny);
    assert_eq!(decision.source, DecisionSource::Verification);
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    assert_eq!(store.value("198.51.100.9"), None);

    let snapshot = stats.get_snapshot();
    assert_eq!(snapshot.cache_write_failures, 1);
    assert_eq!(snapshot.verifications_failed, 1);
    assert_eq!(snapshot.denied, 1);
}
