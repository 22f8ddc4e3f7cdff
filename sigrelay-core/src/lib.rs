#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod actions;
pub mod component;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod exchange;
pub mod logs;
pub mod registry;
pub mod secret;

/// Cap on retained duration samples and in-memory log entries per component.
pub(crate) const HISTORY_LIMIT: usize = 500;
