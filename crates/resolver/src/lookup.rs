//! SRV lookup backends used by the [`crate::Resolver`].

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;

/// One `(host, port)` pair returned by a service-record lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    /// Host name as returned by DNS, possibly fully qualified with a
    /// trailing dot.
    pub target: String,
    pub port: u16,
}

impl SrvRecord {
    pub fn new(target: impl Into<String>, port: u16) -> Self {
        Self {
            target: target.into(),
            port,
        }
    }
}

/// Performs service-record lookups.
///
/// Errors cover both transport failures and negative answers (NXDOMAIN);
/// an empty `Ok` is reported by the resolver as a missing-records failure.
#[async_trait]
pub trait SrvLookup: Send + Sync {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvRecord>>;
}

/// Lookup backed by the system DNS configuration.
pub struct DnsSrvLookup {
    resolver: TokioAsyncResolver,
}

impl DnsSrvLookup {
    pub fn from_system_conf() -> Result<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .context("failed to read system DNS configuration")?;
        Ok(Self { resolver })
    }
}

#[async_trait]
impl SrvLookup for DnsSrvLookup {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvRecord>> {
        let lookup = self
            .resolver
            .srv_lookup(name)
            .await
            .with_context(|| format!("SRV lookup for {name}"))?;

        Ok(lookup
            .iter()
            .map(|srv| SrvRecord::new(srv.target().to_utf8(), srv.port()))
            .collect())
    }
}

/// In-memory lookup table for tests and fixed deployments.
#[derive(Default)]
pub struct StaticSrvLookup {
    records: HashMap<String, Vec<SrvRecord>>,
    failures: HashMap<String, String>,
}

impl StaticSrvLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, name: impl Into<String>, records: Vec<SrvRecord>) -> Self {
        self.records.insert(name.into(), records);
        self
    }

    pub fn with_failure(mut self, name: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failures.insert(name.into(), reason.into());
        self
    }
}

#[async_trait]
impl SrvLookup for StaticSrvLookup {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvRecord>> {
        if let Some(reason) = self.failures.get(name) {
            return Err(anyhow!("{reason}"));
        }
        self.records
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("NXDOMAIN: {name}"))
    }
}
