pub mod console_sink;
pub mod types;

pub use self::console_sink::ConsoleLogSink;
pub use self::types::{DecisionLogEntry, DecisionLogSink};

use crate::config::LoggingConfig;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Fans decision entries out to background sink tasks without blocking requests.
pub struct DecisionLogger {
    sinks: Vec<mpsc::Sender<DecisionLogEntry>>,
}

impl DecisionLogger {
    /// Spawns the console sink. Requires a running tokio runtime.
    pub fn new(config: LoggingConfig) -> Arc<Self> {
        let console: Box<dyn DecisionLogSink> = Box::new(ConsoleLogSink::new(config));
        Self::with_sinks(vec![console])
    }

    pub fn with_sinks(sinks: Vec<Box<dyn DecisionLogSink>>) -> Arc<Self> {
        let mut senders = Vec::with_capacity(sinks.len());
        for sink in sinks {
            let (tx, mut rx) = mpsc::channel::<DecisionLogEntry>(1000);
            tokio::spawn(async move {
                while let Some(entry) = rx.recv().await {
                    sink.log(&entry);
                }
            });
            senders.push(tx);
        }
        Arc::new(Self { sinks: senders })
    }

    /// Logger with no sinks, for callers that want decisions silent.
    pub fn disabled() -> Arc<Self> {
        Arc::new(Self { sinks: vec![] })
    }

    pub fn log(&self, entry: DecisionLogEntry) {
        let Some((last, rest)) = self.sinks.split_last() else {
            return;
        };
        // Fire and forget, don't block caller if buffer full
        for sink in rest {
            let _ = sink.try_send(entry.clone());
        }
        let _ = last.try_send(entry);
    }
}
