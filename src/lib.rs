//! Library crate for artloop-back, exposing modules for binaries and integration tests.

/// Client-side view, feed connectors and the reconnecting sync agent.
pub mod client;
/// Wall-clock helpers.
pub mod clock;
/// Configuration loading and validation.
pub mod config;
/// Wire types shared by the HTTP, SSE and WebSocket surfaces.
pub mod dto;
/// Error types for configuration, services and HTTP responses.
pub mod error;
/// HTTP route trees.
pub mod routes;
/// Request handling on top of the drawing engine.
pub mod services;
/// Drawing engine state and the shared application state.
pub mod state;
