//! Barrage Endpoint Resolver
//!
//! Turns a target locator into the ordered set of endpoints the load test
//! attacks. A locator that parses as an absolute URL is used verbatim;
//! anything else is treated as a DNS service name and expanded through an
//! SRV lookup into one `scheme://host:port/` endpoint per record.
//!
//! Resolution happens once while the load test is configured. The resolved
//! sets are frozen for the lifetime of the run.

pub mod lookup;

pub use lookup::{DnsSrvLookup, SrvLookup, SrvRecord, StaticSrvLookup};

use std::sync::Arc;

use barrage_types::{Conventions, Endpoint, ResolutionError, TargetSpec};
use tracing::{debug, info};
use url::Url;

/// A target together with the endpoints it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub name: String,
    pub endpoints: Vec<Endpoint>,
}

#[derive(Clone)]
pub struct Resolver {
    lookup: Arc<dyn SrvLookup>,
    scheme: String,
}

impl Resolver {
    pub fn new(lookup: Arc<dyn SrvLookup>, conventions: &Conventions) -> Self {
        Self {
            lookup,
            scheme: conventions.discovery_scheme.clone(),
        }
    }

    /// Resolves a single locator.
    pub async fn resolve(&self, locator: &str) -> Result<Vec<Endpoint>, ResolutionError> {
        if is_literal_url(locator) {
            debug!("Locator {} is a literal URL", locator);
            return Ok(vec![Endpoint::new(locator)]);
        }

        let records = self
            .lookup
            .lookup_srv(locator)
            .await
            .map_err(|err| ResolutionError::Lookup {
                name: locator.to_string(),
                reason: format!("{err:#}"),
            })?;

        // One endpoint per record; layers collapse repeats at registration.
        let endpoints: Vec<Endpoint> = records
            .iter()
            .map(|record| self.endpoint_for(record))
            .collect();

        if endpoints.is_empty() {
            return Err(ResolutionError::NoRecords {
                name: locator.to_string(),
            });
        }

        info!(
            "Discovered {} endpoint(s) for {}",
            endpoints.len(),
            locator
        );
        Ok(endpoints)
    }

    pub async fn resolve_target(&self, spec: &TargetSpec) -> Result<ResolvedTarget, ResolutionError> {
        let endpoints = self.resolve(&spec.locator).await.map_err(|err| match err {
            ResolutionError::NoRecords { .. } => ResolutionError::NoRecords {
                name: spec.name.clone(),
            },
            other => other,
        })?;
        Ok(ResolvedTarget {
            name: spec.name.clone(),
            endpoints,
        })
    }

    /// Resolves every target, failing on the first one that cannot be
    /// resolved so a partially configured test never starts.
    pub async fn resolve_all(
        &self,
        specs: &[TargetSpec],
    ) -> Result<Vec<ResolvedTarget>, ResolutionError> {
        let mut resolved = Vec::with_capacity(specs.len());
        for spec in specs {
            resolved.push(self.resolve_target(spec).await?);
        }
        Ok(resolved)
    }

    fn endpoint_for(&self, record: &SrvRecord) -> Endpoint {
        let host = record.target.trim_end_matches('.');
        Endpoint::new(format!("{}://{}:{}/", self.scheme, host, record.port))
    }
}

/// True when `locator` parses as an absolute URL carrying a scheme.
pub fn is_literal_url(locator: &str) -> bool {
    Url::parse(locator)
        .map(|url| !url.scheme().is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_url_detection() {
        assert!(is_literal_url("http://localhost:9999/"));
        assert!(is_literal_url("https://api.example.com/health?x=1"));
        assert!(!is_literal_url("_http._tcp.api.service.consul"));
        assert!(!is_literal_url("api.service.consul"));
        assert!(!is_literal_url(""));
    }
}
