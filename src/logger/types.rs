use crate::engine::{DecisionSource, Outcome};

#[derive(Debug, Clone)]
pub struct DecisionLogEntry {
    pub client_ip: Option<String>,
    pub scope: String,
    pub claimed_provider: Option<String>,
    pub outcome: Outcome,
    pub source: DecisionSource,
    pub latency_ms: u64,
}

pub trait DecisionLogSink: Send + Sync {
    fn log(&self, entry: &DecisionLogEntry);
}
