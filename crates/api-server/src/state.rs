//! Application state

use std::sync::Arc;

use cm_core::identity::IdentityProvider;
use cm_core::token::TokenIssuer;
use cm_core::user::UserDirectory;
use cm_core::{SessionConfig, SessionService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    sessions: SessionService,
}

impl AppState {
    /// Create a new AppState from already-initialized collaborators
    pub fn new(
        config: &SessionConfig,
        provider: Arc<dyn IdentityProvider>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let sessions = SessionService::new(provider, directory, TokenIssuer::new(config));
        Self {
            inner: Arc::new(AppStateInner { sessions }),
        }
    }

    /// Get reference to the session service
    pub fn sessions(&self) -> &SessionService {
        &self.inner.sessions
    }
}
