use serde::{Deserialize, Serialize};

/// Reply to a `HealthCheck` call. Computed fresh per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub message: String,
    pub status: bool,
}

impl HealthCheckResponse {
    pub fn healthy() -> Self {
        Self {
            message: "Healthy".to_string(),
            status: true,
        }
    }
}
