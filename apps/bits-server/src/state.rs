//! Application state management

use std::sync::Arc;

use crate::bits::BitsHandler;
use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    handler: BitsHandler,
}

impl AppState {
    pub fn new(config: Config, handler: BitsHandler) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, handler }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the protocol handler
    pub fn handler(&self) -> &BitsHandler {
        &self.inner.handler
    }
}
