#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Registration PubSub Adapter
//!
//! Exposes a single HTTP registration endpoint and hands every incoming device
//! registration, one at a time, to an in-process consumer that accepts (ack) or
//! rejects (nack) it. The consumer's decision travels back to the HTTP caller
//! that is still waiting on its connection.
//!
//! ## Architecture
//!
//! ```text
//! caller -> axum handler -> Parser -> Bridge ==rendezvous== consumer
//!                                       ^                      |
//!                                       +---- oneshot Outcome --+ (ack / nack)
//! ```
//!
//! ## Module Organization
//!
//! - [`bridge`] - Rendezvous hand-off, outcomes and the single-use [`AckNacker`]
//! - [`parser`] - The [`Parser`] trait and the JSON implementation
//! - [`registration`] - Registration domain values
//! - [`web`] - Axum routes, handler, middleware and error responses
//! - [`adapter`] - Listener lifecycle and the consumer-facing accessor
//! - [`config`] - Environment-driven configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Error types
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and HTTP integration tests
//! ```

pub mod adapter;
pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;
pub mod parser;
pub mod registration;
pub mod web;

pub use adapter::PubSubAdapter;
pub use bridge::{AckNacker, Bridge, BridgeProcessingStats, Delivery, Outcome};
pub use config::{AdapterConfig, LogFormat};
pub use error::{AdapterError, AdapterResult, BridgeError, ConfigurationError};
pub use parser::{InboundRequest, JsonRegistrationParser, ParseError, Parser};
pub use registration::{AppEui, DevAddr, NwkSKey, Registration};
