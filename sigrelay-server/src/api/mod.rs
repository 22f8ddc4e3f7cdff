//! HTTP handlers.
//!
//! - `webhook` serves `POST /webhook`, the signal source entrypoint.
//! - `admin` serves the dashboard, log, introspection and exchange endpoints.

pub mod admin;
pub mod extractors;
pub mod webhook;
