use crate::model::HealthCheckResponse;

/// Answers `HealthCheck`. Holds no state and cannot fail: a reply at all means the
/// process is reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthReporter;

impl HealthReporter {
    pub fn check(&self) -> HealthCheckResponse {
        HealthCheckResponse::healthy()
    }
}
