use std::time::Duration;

use serde::Serialize;

/// Status code recorded when a request never produced an HTTP response
/// (connection refused, timeout, TLS failure).
pub const TRANSPORT_ERROR_CODE: u16 = 0;

/// What the traffic generator reports for a single completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub status_code: u16,
    pub latency: Duration,
}

impl Outcome {
    pub fn new(status_code: u16, latency: Duration) -> Self {
        Self {
            status_code,
            latency,
        }
    }

    pub fn transport_error(latency: Duration) -> Self {
        Self::new(TRANSPORT_ERROR_CODE, latency)
    }

    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status_code)
    }
}

/// One request outcome attributed to its layer, endpoint and test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttackResult {
    pub target: String,
    pub endpoint: String,
    pub test_name: String,
    pub status_code: u16,
    pub latency: Duration,
}

impl AttackResult {
    pub fn code_label(&self) -> String {
        self.status_code.to_string()
    }
}
