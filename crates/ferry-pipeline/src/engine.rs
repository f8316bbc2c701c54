//! Shared state every route sees at call time.

use std::sync::Arc;

use ferry_config::FerryConfig;
use ferry_extract::Settings;

use crate::extension::{Extension, ExtensionRegistry};
use crate::negotiate::ContentNegotiation;

/// Configuration, extensions and renderers, shared by all routes of a
/// server.
#[derive(Debug, Clone)]
pub struct Engine {
    config: Arc<FerryConfig>,
    extensions: ExtensionRegistry,
    negotiation: Arc<ContentNegotiation>,
}

impl Engine {
    /// Engine over `config` with no extensions and the default renderers.
    pub fn new(config: Arc<FerryConfig>) -> Self {
        Self {
            config,
            extensions: ExtensionRegistry::empty(),
            negotiation: Arc::new(ContentNegotiation::default()),
        }
    }

    /// Replaces the extension registry.
    pub fn with_extensions(mut self, extensions: ExtensionRegistry) -> Self {
        self.extensions = extensions;
        self
    }

    /// Replaces the content negotiation table.
    pub fn with_negotiation(mut self, negotiation: ContentNegotiation) -> Self {
        self.negotiation = Arc::new(negotiation);
        self
    }

    /// Server configuration.
    pub fn config(&self) -> &Arc<FerryConfig> {
        &self.config
    }

    /// Extraction switches.
    pub fn settings(&self) -> Settings {
        Settings::from_config(&self.config.system)
    }

    /// Extensions whose hooks run. Empty while `system.disable_extensions`
    /// is set.
    pub fn extensions(&self) -> &[Arc<dyn Extension>] {
        if self.config.system.disable_extensions {
            &[]
        } else {
            self.extensions.as_slice()
        }
    }

    /// Every registered extension, whether or not hooks are enabled.
    pub fn registry(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    /// Renderers keyed by content type.
    pub fn negotiation(&self) -> &ContentNegotiation {
        &self.negotiation
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Arc::new(FerryConfig::default()))
    }
}
