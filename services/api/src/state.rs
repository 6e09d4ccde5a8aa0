//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the chat orchestrator and configuration.

use crate::config::Config;
use std::sync::Arc;
use taylor_core::orchestrator::ChatOrchestrator;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// `None` when the upstream credential is missing; chat requests then fail with 500.
    pub orchestrator: Option<Arc<ChatOrchestrator>>,
    pub config: Arc<Config>,
}
