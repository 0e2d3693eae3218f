use super::address::AddressExtractor;
use super::identifier::IdentifierMatcher;
use super::traits::RequestContext;
use super::verifier::{FcrdnsVerifier, Verdict};
use crate::cache::{CacheHealth, CacheLookup, VerdictCache};
use crate::logger::{DecisionLogEntry, DecisionLogger};
use crate::stats::VerifierStats;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// What the interception layer should do with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No opinion; let other layers decide.
    Continue,
    /// Skip further checks.
    Allow,
    /// Reject with a generic access-denied response.
    Deny,
}

/// Which step of the decision produced the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    Disabled,
    CacheUnavailable,
    NoAddress,
    Cache,
    CacheError,
    NoClaim,
    Verification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    pub source: DecisionSource,
}

impl Decision {
    fn new(outcome: Outcome, source: DecisionSource) -> Self {
        Self { outcome, source }
    }
}

/// Per-scope behaviour of a [`DecisionEngine`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub scope: String,
    pub enabled: bool,
    pub identity_header: String,
}

/// Shared, immutable pieces used by every scope.
#[derive(Clone)]
pub struct SharedComponents {
    pub extractor: Arc<AddressExtractor>,
    pub matcher: Arc<IdentifierMatcher>,
    pub verifier: Arc<FcrdnsVerifier>,
    pub stats: Arc<VerifierStats>,
    pub decisions: Arc<DecisionLogger>,
}

pub struct DecisionEngine {
    settings: EngineSettings,
    shared: SharedComponents,
    cache: VerdictCache,
}

impl DecisionEngine {
    pub fn new(settings: EngineSettings, shared: SharedComponents, cache: VerdictCache) -> Self {
        Self {
            settings,
            shared,
            cache,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub async fn decide<C: RequestContext + ?Sized>(&self, ctx: &C) -> Decision {
        if !self.settings.enabled {
            return Decision::new(Outcome::Continue, DecisionSource::Disabled);
        }

        let start = Instant::now();
        self.shared.stats.inc_requests();

        let mut client_ip = None;
        let mut claimed = None;
        let decision = self.run(ctx, &mut client_ip, &mut claimed).await;

        match decision.outcome {
            Outcome::Allow => self.shared.stats.inc_allowed(),
            Outcome::Deny => self.shared.stats.inc_denied(),
            Outcome::Continue => self.shared.stats.inc_bypassed(),
        }

        self.shared.decisions.log(DecisionLogEntry {
            client_ip,
            scope: self.settings.scope.clone(),
            claimed_provider: claimed,
            outcome: decision.outcome,
            source: decision.source,
            latency_ms: start.elapsed().as_millis() as u64,
        });

        decision
    }

    async fn run<C: RequestContext + ?Sized>(
        &self,
        ctx: &C,
        client_ip: &mut Option<String>,
        claimed: &mut Option<String>,
    ) -> Decision {
        // 1. Cache connectivity
        match self.cache.ensure_connected().await {
            CacheHealth::Connected => {}
            CacheHealth::Disconnected => {
                self.shared.stats.inc_cache_error();
                return Decision::new(Outcome::Continue, DecisionSource::CacheUnavailable);
            }
        }

        // 2. Client address
        let address = match self.shared.extractor.extract(ctx) {
            Ok(address) => address,
            Err(e) => {
                error!("Unable to determine connected address, bypassing: {}", e);
                return Decision::new(Outcome::Continue, DecisionSource::NoAddress);
            }
        };
        *client_ip = Some(address.to_string());

        // 3. Cached verdict
        match self.cache.get(&address).await {
            CacheLookup::Allowed => {
                self.shared.stats.inc_cache_hit();
                debug!("Cache returned valid actor {}, allowing request", address);
                return Decision::new(Outcome::Allow, DecisionSource::Cache);
            }
            CacheLookup::Blocked => {
                self.shared.stats.inc_cache_hit();
                debug!("Cache returned invalid actor {}, blocking request", address);
                return Decision::new(Outcome::Deny, DecisionSource::Cache);
            }
            CacheLookup::Error => {
                self.shared.stats.inc_cache_error();
                error!("Unable to lookup verification status for {}, bypassing", address);
                return Decision::new(Outcome::Continue, DecisionSource::CacheError);
            }
            CacheLookup::Miss => self.shared.stats.inc_cache_miss(),
        }

        // 4. Identity claim
        let claim = ctx.header(&self.settings.identity_header);
        let provider = match self.shared.matcher.match_claim(claim) {
            Some(provider) => provider,
            None => return Decision::new(Outcome::Allow, DecisionSource::NoClaim),
        };
        *claimed = Some(provider.to_string());
        self.shared.stats.record_claim(provider);

        // 5. Verification
        let verdict = self.shared.verifier.verify(address, provider).await;
        self.shared
            .stats
            .record_verification(verdict == Verdict::Allowed);

        // 6. Persist; a failed write does not change this request's outcome
        if let Err(e) = self.cache.put(&address, verdict).await {
            self.shared.stats.inc_cache_write_failure();
            error!("Unable to persist verdict for {}: {}", address, e);
        }

        match verdict {
            Verdict::Allowed => {
                info!("Verification successful for {}, allowing request", address);
                Decision::new(Outcome::Allow, DecisionSource::Verification)
            }
            Verdict::Blocked => {
                info!("Verification failed for {}, blocking request", address);
                Decision::new(Outcome::Deny, DecisionSource::Verification)
            }
        }
    }
}
