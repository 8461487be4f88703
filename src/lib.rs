//! Emberhub Relay Core
//!
//! Bridges synchronous "perform action on device" calls onto an
//! asynchronous, best-effort publish/subscribe transport with possibly
//! offline endpoints.
//!
//! This crate provides:
//! - [`presence::PresenceStore`]: last-known transport connectivity per device
//! - [`correlation::CorrelationTable`]: in-flight request tracking with
//!   single-resolution semantics
//! - [`listener::ResponseListener`]: the long-lived task resolving inbound
//!   device responses
//! - [`engine::ExecutionEngine`]: the orchestrator callers invoke
//! - [`transport`]: the publish capability seam and an in-process loopback

pub mod config;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod listener;
pub mod presence;
pub mod sweeper;
pub mod transport;

pub use config::RelayConfig;
pub use engine::ExecutionEngine;
pub use error::ExecuteError;
