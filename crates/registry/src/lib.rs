//! Barrage result registry
//!
//! Folds [`AttackResult`]s into Prometheus series:
//!
//! - `barrage_requests_total`: counter per label tuple;
//! - `barrage_request_duration_seconds`: latency summary per label tuple.
//!
//! The label tuple is `(target, endpoint, code)` or the subset configured in
//! [`Conventions::labels`], plus a constant `test` label. The recorder is
//! local to the registry rather than process-global, so independent load
//! tests (and tests) never share series.
//!
//! [`Registry`] is the single writer and is meant to be owned by the
//! aggregator. Scrapes go through any number of [`RegistryReader`] clones,
//! which the exporter allows to render concurrently with writes.
//!
//! Latency samples are buffered by the exporter until the next render. The
//! owner must call [`Registry::upkeep`] every [`Registry::upkeep_interval`]
//! so an unscraped registry stays bounded.

use std::time::Duration;

use barrage_types::{AttackResult, Conventions, LabelKind, LabelSet};
use metrics::{describe_counter, describe_histogram, Label, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use thiserror::Error;
use tracing::debug;

pub const REQUESTS_TOTAL: &str = "barrage_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "barrage_request_duration_seconds";

/// Constant label carrying the load test name on every series.
pub const TEST_LABEL: &str = "test";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid registry configuration: {0}")]
    Build(String),
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub quantiles: Vec<f64>,
    /// How often buffered latency samples are folded into the summaries.
    pub upkeep_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            quantiles: vec![0.5, 0.9, 0.95, 0.99],
            upkeep_interval: Duration::from_secs(5),
        }
    }
}

pub struct Registry {
    recorder: PrometheusRecorder,
    labels: LabelSet,
    upkeep_interval: Duration,
    observed: u64,
    upkeeps: u64,
}

impl Registry {
    pub fn new(
        test_name: &str,
        conventions: &Conventions,
        config: &RegistryConfig,
    ) -> Result<Self, RegistryError> {
        let recorder = PrometheusBuilder::new()
            .add_global_label(TEST_LABEL, test_name)
            .set_quantiles(&config.quantiles)
            .map_err(|err| RegistryError::Build(err.to_string()))?
            .build_recorder();
        if config.upkeep_interval.is_zero() {
            return Err(RegistryError::Build(
                "upkeep interval must be non-zero".to_string(),
            ));
        }

        metrics::with_local_recorder(&recorder, || {
            describe_counter!(
                REQUESTS_TOTAL,
                "The total number of requests per target, endpoint and HTTP status code"
            );
            describe_histogram!(
                REQUEST_DURATION_SECONDS,
                Unit::Seconds,
                "Latency of load test requests in seconds"
            );
        });

        debug!(
            "Registry for load test {} labels series by {:?}",
            test_name, conventions.labels
        );

        Ok(Self {
            recorder,
            labels: conventions.labels.clone(),
            upkeep_interval: config.upkeep_interval,
            observed: 0,
            upkeeps: 0,
        })
    }

    /// Counts one result and records its latency sample.
    pub fn observe(&mut self, result: &AttackResult) {
        let labels = self.labels_for(result);
        let latency = result.latency.as_secs_f64();
        metrics::with_local_recorder(&self.recorder, || {
            metrics::counter!(REQUESTS_TOTAL, labels.clone()).increment(1);
            metrics::histogram!(REQUEST_DURATION_SECONDS, labels).record(latency);
        });
        self.observed += 1;
    }

    /// Number of results folded so far.
    pub fn observed(&self) -> u64 {
        self.observed
    }

    /// Folds buffered latency samples into their summaries.
    ///
    /// The exporter only drains its sample buckets while rendering, so this
    /// renders and discards the text.
    pub fn upkeep(&mut self) {
        let _ = self.recorder.handle().render();
        self.upkeeps += 1;
    }

    pub fn upkeep_interval(&self) -> Duration {
        self.upkeep_interval
    }

    pub fn upkeeps(&self) -> u64 {
        self.upkeeps
    }

    pub fn reader(&self) -> RegistryReader {
        RegistryReader {
            handle: self.recorder.handle(),
        }
    }

    fn labels_for(&self, result: &AttackResult) -> Vec<Label> {
        self.labels
            .iter()
            .map(|kind| {
                let value = match kind {
                    LabelKind::Target => result.target.clone(),
                    LabelKind::Endpoint => result.endpoint.clone(),
                    LabelKind::Code => result.code_label(),
                };
                Label::new(kind.as_str(), value)
            })
            .collect()
    }
}

/// Read-only view of a [`Registry`] for scraping.
#[derive(Clone)]
pub struct RegistryReader {
    handle: PrometheusHandle,
}

impl RegistryReader {
    /// Renders every series in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(code: u16) -> AttackResult {
        AttackResult {
            target: "api".to_string(),
            endpoint: "http://localhost:9999/".to_string(),
            test_name: "smoke".to_string(),
            status_code: code,
            latency: Duration::from_millis(12),
        }
    }

    #[test]
    fn empty_quantiles_are_rejected() {
        let config = RegistryConfig {
            quantiles: vec![],
            ..RegistryConfig::default()
        };
        let err = Registry::new("smoke", &Conventions::default(), &config)
            .err()
            .expect("empty quantiles must fail");
        assert!(matches!(err, RegistryError::Build(_)));
    }

    #[test]
    fn zero_upkeep_interval_is_rejected() {
        let config = RegistryConfig {
            upkeep_interval: Duration::ZERO,
            ..RegistryConfig::default()
        };
        assert!(Registry::new("smoke", &Conventions::default(), &config).is_err());
    }

    #[test]
    fn labels_follow_the_configured_subset() {
        let conventions = Conventions::with_labels(LabelSet::new([LabelKind::Code]));
        let registry = Registry::new("smoke", &conventions, &RegistryConfig::default()).unwrap();
        let labels = registry.labels_for(&result(404));
        assert_eq!(labels, vec![Label::new("code", "404")]);
    }

    #[test]
    fn observe_counts_results() {
        let mut registry =
            Registry::new("smoke", &Conventions::default(), &RegistryConfig::default()).unwrap();
        registry.observe(&result(200));
        registry.observe(&result(500));
        assert_eq!(registry.observed(), 2);
    }

    #[test]
    fn upkeep_keeps_samples_in_the_summary() {
        let mut registry =
            Registry::new("smoke", &Conventions::default(), &RegistryConfig::default()).unwrap();
        for _ in 0..3 {
            registry.observe(&result(200));
        }
        registry.upkeep();
        registry.observe(&result(200));
        registry.upkeep();
        assert_eq!(registry.upkeeps(), 2);

        let text = registry.reader().render();
        let count = text
            .lines()
            .find(|line| line.starts_with("barrage_request_duration_seconds_count{"))
            .and_then(|line| line.rsplit(' ').next())
            .and_then(|value| value.parse::<u64>().ok());
        assert_eq!(count, Some(4));
    }
}
