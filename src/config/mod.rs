//! # Configuration
//!
//! Controller-level configuration loaded from environment variables.

mod controller;

pub use controller::ControllerConfig;

use std::sync::Arc;
use tokio::sync::RwLock;

/// Controller configuration shared between the watch loop and the HTTP server
pub type SharedControllerConfig = Arc<RwLock<ControllerConfig>>;

/// Load configuration from the environment and wrap it for sharing
#[must_use]
pub fn create_shared_config() -> SharedControllerConfig {
    Arc::new(RwLock::new(ControllerConfig::from_env()))
}
