use crate::factory::SessionFactory;
use crate::recognition::RecognitionConfig;
use crate::session::SessionRegistry;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Live sessions (handle → session)
    pub registry: Arc<SessionRegistry>,

    /// Builds sessions for `POST /sessions`
    pub factory: Arc<dyn SessionFactory>,

    /// Config applied when `start` is called without a body
    pub defaults: RecognitionConfig,
}

impl AppState {
    pub fn new(registry: Arc<SessionRegistry>, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            registry,
            factory,
            defaults: RecognitionConfig::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: RecognitionConfig) -> Self {
        self.defaults = defaults;
        self
    }
}
