/// Answer resolution and game flow control.
pub mod answer_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Active power-up effect store.
pub mod powerup_service;
/// Disconnection grace periods and seat recovery.
pub mod reconnect_service;
/// Push event construction and fan-out.
pub mod room_events;
/// Room coordination: creation, lookup, joining, serialized mutation.
pub mod room_service;
/// Storage and cache supervision.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
