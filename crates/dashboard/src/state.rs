//! Application state shared across handlers.

use std::sync::Arc;

use crate::auth::SessionStore;
use crate::config::DashboardConfig;
use crate::supabase::{SupabaseClient, SupabaseError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// configuration, the backend client, and the session store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: DashboardConfig,
    supabase: Option<SupabaseClient>,
    session: SessionStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The backend client is only constructed when the environment carries
    /// the backend pair; otherwise the session store runs in its
    /// not-configured mode.
    ///
    /// # Errors
    ///
    /// Returns an error when the configured backend URL cannot be turned
    /// into a client.
    pub fn new(config: DashboardConfig) -> Result<Self, SupabaseError> {
        let supabase = config
            .supabase
            .as_ref()
            .map(SupabaseClient::new)
            .transpose()?;
        let session = SessionStore::new(supabase.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                supabase,
                session,
            }),
        })
    }

    /// Get a reference to the dashboard configuration.
    #[must_use]
    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    /// Get a reference to the backend client, when configured.
    #[must_use]
    pub fn supabase(&self) -> Option<&SupabaseClient> {
        self.inner.supabase.as_ref()
    }

    /// Get a reference to the session store.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }
}
