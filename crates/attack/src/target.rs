use std::collections::BTreeMap;

use barrage_types::{ConstructionError, Endpoint};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use url::Url;

/// A validated request template for one endpoint.
///
/// Building it is the only place a malformed endpoint or header can be
/// detected; once constructed, every request issued from it is well formed.
#[derive(Debug, Clone)]
pub struct AttackTarget {
    endpoint: Endpoint,
    method: Method,
    url: Url,
    headers: HeaderMap,
}

impl AttackTarget {
    pub fn new(
        endpoint: &Endpoint,
        headers: &BTreeMap<String, String>,
    ) -> Result<Self, ConstructionError> {
        let url = Url::parse(endpoint.as_str()).map_err(|err| ConstructionError::InvalidUrl {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ConstructionError::UnsupportedScheme {
                    endpoint: endpoint.to_string(),
                    scheme: scheme.to_string(),
                })
            }
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(ConstructionError::InvalidUrl {
                endpoint: endpoint.to_string(),
                reason: "missing host".to_string(),
            });
        }

        let mut header_map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                ConstructionError::InvalidHeader {
                    name: name.clone(),
                    reason: err.to_string(),
                }
            })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|err| ConstructionError::InvalidHeader {
                    name: name.clone(),
                    reason: err.to_string(),
                })?;
            header_map.insert(header_name, header_value);
        }

        Ok(Self {
            endpoint: endpoint.clone(),
            method: Method::GET,
            url,
            headers: header_map,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn request(&self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone())
    }
}
