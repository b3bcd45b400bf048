use std::fmt;
use std::time::Duration;

use barrage_types::Outcome;
use hdrhistogram::Histogram;
use tracing::debug;

/// Local digest of one attack cycle, logged by the attack loop after every
/// cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleSummary {
    pub requests: u64,
    pub successes: u64,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl CycleSummary {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let requests = outcomes.len() as u64;
        let successes = outcomes.iter().filter(|o| o.is_success()).count() as u64;

        // Latencies in microseconds; three significant figures, auto-resizing.
        let Ok(mut latencies) = Histogram::<u64>::new(3) else {
            return Self {
                requests,
                successes,
                ..Self::default()
            };
        };
        for outcome in outcomes {
            let micros = outcome.latency.as_micros().min(u64::MAX as u128) as u64;
            if let Err(err) = latencies.record(micros.max(1)) {
                debug!("Failed to record latency sample of {}us: {}", micros, err);
            }
        }

        let quantile = |q: f64| {
            if latencies.len() == 0 {
                Duration::ZERO
            } else {
                Duration::from_micros(latencies.value_at_quantile(q))
            }
        };

        Self {
            requests,
            successes,
            p50: quantile(0.50),
            p95: quantile(0.95),
            p99: quantile(0.99),
        }
    }

    pub fn success_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.successes as f64 / self.requests as f64
        }
    }
}

impl fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "success: {} / {} (50th: {} 95th: {} 99th: {})",
            self.successes,
            self.requests,
            self.p50.as_micros(),
            self.p95.as_micros(),
            self.p99.as_micros()
        )
    }
}
