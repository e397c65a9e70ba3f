//! Fixed exit-to-handler mapping.
//!
//! Useful when exits are backed by forward proxies that are managed outside
//! the process, and as a test double for the orchestrator.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::ExitConfig;
use crate::provider::{ExitHandlerProvider, ProvisionError};
use crate::proxy::SharedHandler;

/// Returns pre-registered handlers keyed by exit name.
#[derive(Default)]
pub struct StaticProvider {
    handlers: HashMap<String, SharedHandler>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `exit`. Names are matched case-insensitively.
    pub fn with_handler(mut self, exit: &str, handler: SharedHandler) -> Self {
        self.handlers.insert(exit.to_ascii_lowercase(), handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl ExitHandlerProvider for StaticProvider {
    async fn get_handler(
        &self,
        exit_name: &str,
        _exit: &ExitConfig,
    ) -> Result<SharedHandler, ProvisionError> {
        self.handlers
            .get(&exit_name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| ProvisionError::NoHandler {
                exit: exit_name.to_string(),
            })
    }
}
