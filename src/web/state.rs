//! Application state shared across handlers

use crate::config::Settings;
use crate::engines::{CallContext, SearchEngine};
use crate::search::SearchService;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Global settings
    pub settings: Arc<Settings>,
    /// Product search service
    pub service: SearchService<dyn SearchEngine>,
}

impl AppState {
    /// Create new application state
    pub fn new(settings: Settings, engine: Arc<dyn SearchEngine>) -> Self {
        Self {
            settings: Arc::new(settings),
            service: SearchService::new(engine),
        }
    }

    /// Fresh call context carrying the configured per-request deadline.
    ///
    /// A non-positive, non-finite or out-of-range deadline means no deadline.
    pub fn call_context(&self) -> CallContext {
        let deadline = Duration::try_from_secs_f64(self.settings.server.request_deadline)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .and_then(|timeout| Instant::now().checked_add(timeout));
        match deadline {
            Some(deadline) => CallContext::background().with_deadline(deadline),
            None => CallContext::background(),
        }
    }

    /// Name of the engine binding in use
    pub fn engine_name(&self) -> &str {
        self.service.engine().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::MemoryEngine;

    fn state_with_deadline(seconds: f64) -> AppState {
        let mut settings = Settings::default();
        settings.server.request_deadline = seconds;
        AppState::new(settings, Arc::new(MemoryEngine::new()))
    }

    #[tokio::test]
    async fn test_call_context_uses_configured_deadline() {
        let remaining = state_with_deadline(2.5).call_context().remaining().unwrap();
        assert!(remaining <= Duration::from_millis(2500));
        assert!(remaining > Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_unusable_deadline_means_background() {
        for seconds in [0.0, -1.0, f64::INFINITY, f64::NAN, 1e300] {
            assert!(state_with_deadline(seconds).call_context().remaining().is_none());
        }

        let settings: Settings = serde_yaml::from_str("server:\n  request_deadline: .inf\n").unwrap();
        let state = AppState::new(settings, Arc::new(MemoryEngine::new()));
        assert!(state.call_context().remaining().is_none());
    }
}
