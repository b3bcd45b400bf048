//! Barrage shared types
//!
//! Value types that flow between the resolver, the attack loops, the
//! aggregator and the scrape server, together with the error taxonomy used
//! across the workspace.

pub mod conventions;
pub mod endpoint;
pub mod error;
pub mod health;
pub mod result;

pub use conventions::{Conventions, HeaderNames, LabelKind, LabelSet};
pub use endpoint::{Endpoint, TargetSpec};
pub use error::{ConstructionError, LoadTestError, ResolutionError, ValidationError};
pub use health::HealthStatus;
pub use result::{AttackResult, Outcome, TRANSPORT_ERROR_CODE};

use std::time::Duration;

/// Requests per second sent to each endpoint unless configured otherwise.
pub const DEFAULT_RATE: u64 = 100;

/// Highest accepted rate; one request per nanosecond.
pub const MAX_RATE: u64 = 1_000_000_000;

/// Length of a single attack cycle unless configured otherwise.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(1);
