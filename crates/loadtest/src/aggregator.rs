use barrage_registry::{Registry, RegistryReader};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::channel::ResultReceiver;

/// What an [`Aggregator`] did before its channel closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AggregatorReport {
    pub folded: u64,
    pub upkeeps: u64,
}

/// Sole consumer of the result channel and sole writer of the registry.
pub struct Aggregator {
    receiver: ResultReceiver,
    registry: Registry,
}

impl Aggregator {
    pub fn new(receiver: ResultReceiver, registry: Registry) -> Self {
        Self { receiver, registry }
    }

    /// Reader for the registry this aggregator writes to.
    pub fn reader(&self) -> RegistryReader {
        self.registry.reader()
    }

    /// Folds results until every sender is dropped and the queue is drained.
    /// Registry upkeep runs on its own interval whether or not anyone scrapes.
    pub async fn run(mut self) -> AggregatorReport {
        debug!(
            "Aggregator started, registry upkeep every {:?}",
            self.registry.upkeep_interval()
        );
        let mut upkeep = tokio::time::interval(self.registry.upkeep_interval());
        upkeep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        upkeep.tick().await;

        let mut folded = 0u64;
        loop {
            tokio::select! {
                received = self.receiver.recv() => match received {
                    Some(result) => {
                        self.registry.observe(&result);
                        folded += 1;
                    }
                    None => break,
                },
                _ = upkeep.tick() => self.registry.upkeep(),
            }
        }

        let report = AggregatorReport {
            folded,
            upkeeps: self.registry.upkeeps(),
        };
        info!(
            "Aggregator stopped after {} results and {} upkeeps",
            report.folded, report.upkeeps
        );
        report
    }
}
