use serde::Serialize;

/// Public observability payload returned by `/health`.
///
/// All fields are integers or strings so the payload stays trivially
/// serializable from any runtime.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub test_name: String,
    pub layer_count: u64,
    pub endpoint_count: u64,
    pub uptime_seconds: u64,
    pub scrapes_served: u64,
    pub version: String,
}

impl HealthStatus {
    pub fn healthy(test_name: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            test_name: test_name.into(),
            layer_count: 0,
            endpoint_count: 0,
            uptime_seconds: 0,
            scrapes_served: 0,
            version: String::new(),
        }
    }
}
