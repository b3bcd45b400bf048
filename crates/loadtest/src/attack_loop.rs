use std::sync::Arc;
use std::time::Duration;

use barrage_attack::{AttackTarget, CycleSummary, TrafficGenerator};
use barrage_types::AttackResult;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::ResultSender;

/// Why an attack loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    ChannelClosed,
}

/// Repeats attack cycles against a single endpoint and reports every outcome.
pub(crate) struct AttackLoop {
    pub(crate) test_name: Arc<str>,
    pub(crate) layer: Arc<str>,
    pub(crate) target: AttackTarget,
    pub(crate) rate: u64,
    pub(crate) duration: Duration,
    pub(crate) generator: Arc<dyn TrafficGenerator>,
    pub(crate) sink: ResultSender,
    pub(crate) cancel: CancellationToken,
}

impl AttackLoop {
    pub(crate) async fn run(self) -> LoopExit {
        let endpoint = self.target.endpoint().to_string();
        debug!(
            "Attack loop started for {} ({} req/s, {:?} cycles)",
            endpoint, self.rate, self.duration
        );

        loop {
            // A started cycle always completes and reports.
            if self.cancel.is_cancelled() {
                debug!("Attack loop for {} cancelled", endpoint);
                return LoopExit::Cancelled;
            }

            let outcomes = self
                .generator
                .attack(&self.target, self.rate, self.duration)
                .await;

            for outcome in &outcomes {
                let result = AttackResult {
                    target: self.layer.to_string(),
                    endpoint: endpoint.clone(),
                    test_name: self.test_name.to_string(),
                    status_code: outcome.status_code,
                    latency: outcome.latency,
                };
                if self.sink.send(result).await.is_err() {
                    warn!(
                        "Result channel closed, stopping attack loop for {}",
                        endpoint
                    );
                    return LoopExit::ChannelClosed;
                }
            }

            let summary = CycleSummary::from_outcomes(&outcomes);
            info!("{} {} {}", self.layer, endpoint, summary);
        }
    }
}
