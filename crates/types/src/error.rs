//! Error taxonomy for configuring and starting a load test.
//!
//! Every variant here is fatal at startup. Per-request failures are never
//! errors: they travel as ordinary results with their status code.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty load test name")]
    EmptyTestName,

    #[error("missing layer name")]
    EmptyLayerName,

    #[error("layer '{layer}' is already registered")]
    DuplicateLayer { layer: String },

    #[error("missing endpoints for layer '{layer}'")]
    NoEndpoints { layer: String },

    #[error("load test '{test}' has no layers registered")]
    NoLayers { test: String },

    #[error("rate must be greater than zero")]
    ZeroRate,

    #[error("rate {rate} exceeds the maximum of {max} requests per second")]
    RateTooHigh { rate: u64, max: u64 },

    #[error("duration must be greater than zero")]
    ZeroDuration,

    #[error("defaults of load test '{test}' are frozen once a layer is registered")]
    DefaultsFrozen { test: String },

    #[error("invalid target '{0}', expected name:locator")]
    InvalidTarget(String),

    #[error("unknown label '{0}', expected one of target, endpoint, code")]
    UnknownLabel(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("service lookup for '{name}' failed: {reason}")]
    Lookup { name: String, reason: String },

    #[error("no endpoints for target '{name}'")]
    NoRecords { name: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("invalid URL format {endpoint}: {reason}")]
    InvalidUrl { endpoint: String, reason: String },

    #[error("unsupported scheme '{scheme}' in {endpoint}")]
    UnsupportedScheme { endpoint: String, scheme: String },

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadTestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Construction(#[from] ConstructionError),
}

impl LoadTestError {
    pub fn is_validation(&self) -> bool {
        matches!(self, LoadTestError::Validation(_))
    }

    pub fn is_construction(&self) -> bool {
        matches!(self, LoadTestError::Construction(_))
    }
}
