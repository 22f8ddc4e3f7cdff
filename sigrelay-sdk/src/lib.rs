//! Shared wire types for Signal Relay.
//!
//! Everything here is plain data: the DTOs returned by the server's HTTP
//! surface, the log record vocabulary, and the trading schemas used by
//! exchange-facing actions.

pub mod objects;

/// Header name for admin API authentication (plaintext secret).
pub const ADMIN_AUTH_HEADER: &str = "Relay-Admin-Authorization";
