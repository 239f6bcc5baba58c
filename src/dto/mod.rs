/// Inbound chat payloads.
pub mod chat;
/// Health check response.
pub mod health;
/// Server and client message envelopes.
pub mod messages;
/// Field validators for inbound payloads.
pub mod validation;
