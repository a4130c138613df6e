use serde::Serialize;
use utoipa::ToSchema;

/// Health check response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: HealthStatus,
}

/// Coarse service status reported by the health endpoint.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Storage backend reachable, full functionality available.
    Ok,
    /// Storage backend unreachable, mutating endpoints are refused.
    Degraded,
}

impl HealthResponse {
    /// Fully operational response.
    pub fn ok() -> Self {
        Self {
            status: HealthStatus::Ok,
        }
    }

    /// Degraded-mode response.
    pub fn degraded() -> Self {
        Self {
            status: HealthStatus::Degraded,
        }
    }
}
