//! # Web API Request Handlers
//!
//! The adapter serves a single endpoint group, device registrations.

pub mod registrations;
