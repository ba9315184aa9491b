//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::PortalConfig;
use crate::content::ModalContent;
use crate::registry::OrganizationRegistry;
use crate::services::radius::AccountApi;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Everything in it is loaded at
/// startup and never mutated; per-visitor state lives in the session.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: PortalConfig,
    registry: OrganizationRegistry,
    content: ModalContent,
    accounts: Arc<dyn AccountApi>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Portal configuration
    /// * `registry` - Organizations loaded from the build artifacts
    /// * `accounts` - Upstream account API
    #[must_use]
    pub fn new(
        config: PortalConfig,
        registry: OrganizationRegistry,
        accounts: Arc<dyn AccountApi>,
    ) -> Self {
        let content = ModalContent::new(config.artifacts_dir.join("server/assets"));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                registry,
                content,
                accounts,
            }),
        }
    }

    /// Get a reference to the portal configuration.
    #[must_use]
    pub fn config(&self) -> &PortalConfig {
        &self.inner.config
    }

    /// Get a reference to the organization registry.
    #[must_use]
    pub fn registry(&self) -> &OrganizationRegistry {
        &self.inner.registry
    }

    /// Get a reference to the modal content renderer.
    #[must_use]
    pub fn content(&self) -> &ModalContent {
        &self.inner.content
    }

    /// Get a reference to the upstream account API.
    #[must_use]
    pub fn accounts(&self) -> &dyn AccountApi {
        self.inner.accounts.as_ref()
    }
}
