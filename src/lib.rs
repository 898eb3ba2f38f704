//! Netmanager Core Library
//!
//! Request orchestration for an RPC-based sync client: one shared transport,
//! a per-request state machine, blocking helpers, user-facing error
//! escalation and response persistence.
//!
//! # Architecture
//!
//! - [`net`] - transport, requests, blocking facade, escalation, file sink
//! - [`interaction`] - the decisions the layer asks of its host (prompts,
//!   save destinations, I/O error notices)

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod interaction;
pub mod net;
mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use interaction::{EscalationChoice, HeadlessInteraction, Interaction, SettingsSection};
pub use net::{
    BlockingClient, CertificatePolicy, ExchangeHandle, FileSink, NetworkErrorKind, Phase,
    ProxyPolicy, Request, RequestDescriptor, Response, Transport, TransportConfig, TransportError,
};
pub use user_agent::default_user_agent;
