use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use barrage_types::Outcome;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::target::AttackTarget;

/// Shortest pacing period tokio's interval accepts.
const MIN_PERIOD: Duration = Duration::from_nanos(1);

const MAX_PREALLOCATED_OUTCOMES: u64 = 1 << 16;

/// Executes one rate-paced attack cycle.
///
/// Implementations return after roughly `duration` (plus the time needed for
/// requests still in flight to complete) with one outcome per request, in the
/// order the requests completed.
#[async_trait]
pub trait TrafficGenerator: Send + Sync {
    async fn attack(&self, target: &AttackTarget, rate: u64, duration: Duration) -> Vec<Outcome>;
}

#[derive(Debug, Clone)]
pub struct AttackerConfig {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Upper bound on concurrently outstanding requests within one cycle.
    pub max_in_flight: usize,
}

impl Default for AttackerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            max_in_flight: 1024,
        }
    }
}

/// Number of requests a cycle of `duration` at `rate` requests per second
/// issues.
pub fn planned_hits(rate: u64, duration: Duration) -> u64 {
    (rate as f64 * duration.as_secs_f64()).round() as u64
}

/// [`TrafficGenerator`] issuing real HTTP requests through `reqwest`.
#[derive(Clone)]
pub struct HttpAttacker {
    client: reqwest::Client,
    config: AttackerConfig,
}

impl HttpAttacker {
    pub fn new(config: AttackerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.max_in_flight.max(32))
            .user_agent(concat!("barrage/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build reqwest client")?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AttackerConfig {
        &self.config
    }
}

#[async_trait]
impl TrafficGenerator for HttpAttacker {
    async fn attack(&self, target: &AttackTarget, rate: u64, duration: Duration) -> Vec<Outcome> {
        let hits = planned_hits(rate, duration);
        if hits == 0 {
            // Nothing to send; still hold the cycle length so callers never spin.
            tokio::time::sleep(duration).await;
            return Vec::new();
        }

        let period = Duration::from_secs_f64(1.0 / rate as f64).max(MIN_PERIOD);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        let limiter = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let mut in_flight: JoinSet<Outcome> = JoinSet::new();
        let mut outcomes = Vec::with_capacity(hits.min(MAX_PREALLOCATED_OUTCOMES) as usize);

        for _ in 0..hits {
            ticker.tick().await;

            // Drain completions opportunistically to keep the set bounded.
            while let Some(done) = in_flight.try_join_next() {
                collect(done, &mut outcomes);
            }

            let Ok(permit) = limiter.clone().acquire_owned().await else {
                break;
            };
            let request = target.request(&self.client);
            in_flight.spawn(async move {
                let _permit = permit;
                let started = Instant::now();
                match request.send().await {
                    Ok(response) => {
                        let status = response.status().as_u16();
                        // Read the body so the connection returns to the pool.
                        if let Err(err) = response.bytes().await {
                            debug!("Failed to read response body: {}", err);
                        }
                        Outcome::new(status, started.elapsed())
                    }
                    Err(err) => {
                        debug!("Request failed: {}", err);
                        Outcome::transport_error(started.elapsed())
                    }
                }
            });
        }

        while let Some(done) = in_flight.join_next().await {
            collect(done, &mut outcomes);
        }

        outcomes
    }
}

fn collect(done: Result<Outcome, tokio::task::JoinError>, outcomes: &mut Vec<Outcome>) {
    match done {
        Ok(outcome) => outcomes.push(outcome),
        Err(err) => warn!("Request task aborted: {}", err),
    }
}
