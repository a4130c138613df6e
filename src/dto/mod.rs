use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Snapshot projections shared by REST and push payloads.
pub mod common;
/// Health check payloads.
pub mod health;
/// REST request/response payloads for room actions.
pub mod room;
/// Validation helpers for DTOs.
pub mod validation;
/// WebSocket message payloads.
pub mod ws;

pub(crate) fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
