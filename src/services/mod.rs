/// OpenAPI documentation generation.
pub mod documentation;
/// Snapshot and chat operations on the drawing engine.
pub mod drawing_service;
/// Health check service.
pub mod health_service;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
