use crate::config::LoggingConfig;
use crate::engine::{DecisionSource, Outcome};
use crate::logger::types::{DecisionLogEntry, DecisionLogSink};
use tracing::info;

pub struct ConsoleLogSink {
    config: LoggingConfig,
}

impl ConsoleLogSink {
    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }
}

impl DecisionLogSink for ConsoleLogSink {
    fn log(&self, entry: &DecisionLogEntry) {
        if !self.config.log_decisions {
            return;
        }

        let client = entry.client_ip.as_deref().unwrap_or("-");
        let claim = entry.claimed_provider.as_deref().unwrap_or("-");

        if self.config.format == "json" {
            info!(
                target: "bot_decision",
                client = %client,
                scope = %entry.scope,
                claim = %claim,
                outcome = ?entry.outcome,
                source = ?entry.source,
                lat = %entry.latency_ms
            );
        } else {
            let action_str = match (entry.outcome, entry.source) {
                (Outcome::Allow, DecisionSource::Cache) => "allowed from cache",
                (Outcome::Deny, DecisionSource::Cache) => "denied from cache",
                (Outcome::Allow, DecisionSource::NoClaim) => "allowed, no crawler claimed",
                (Outcome::Allow, DecisionSource::Verification) => "allowed after verification",
                (Outcome::Deny, DecisionSource::Verification) => "denied after verification",
                (Outcome::Continue, DecisionSource::CacheUnavailable) => {
                    "bypassed, cache unavailable"
                }
                (Outcome::Continue, DecisionSource::CacheError) => "bypassed, cache error",
                (Outcome::Continue, DecisionSource::NoAddress) => "bypassed, no client address",
                (Outcome::Continue, DecisionSource::Disabled) => "bypassed, disabled",
                _ => "decided",
            };

            info!(
                "[{}] {} claiming {} -> {} [{}ms]",
                entry.scope, client, claim, action_str, entry.latency_ms
            );
        }
    }
}
