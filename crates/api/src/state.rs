use std::sync::Arc;

use atelier_replicate::ImageGenerator;
use atelier_store::JobStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Job registry.
    pub store: Arc<dyn JobStore>,
    /// Remote generation client (or a test double).
    pub generator: Arc<dyn ImageGenerator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
