//! # Web Application State
//!
//! Shared state handed to every registration handler.

use std::sync::Arc;

use crate::bridge::Bridge;
use crate::config::AdapterConfig;
use crate::parser::Parser;

/// Shared application state for the registration endpoint
///
/// Contains:
/// - The bridge that hands registrations to the consumer
/// - The parser turning request bodies into registrations
/// - Adapter configuration (submit deadline)
#[derive(Clone)]
pub struct AppState {
    pub bridge: Bridge,
    pub parser: Arc<dyn Parser>,
    pub config: Arc<AdapterConfig>,
}

impl AppState {
    pub fn new(bridge: Bridge, parser: Arc<dyn Parser>, config: AdapterConfig) -> Self {
        Self {
            bridge,
            parser,
            config: Arc::new(config),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("bridge", &self.bridge)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
