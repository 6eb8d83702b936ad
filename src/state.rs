//! Shared application state handed to every handler and middleware.

use crate::config::AuthSettings;
use crate::store::ApiKeyStore;
use std::sync::Arc;

/// Cheap to clone: both fields are reference counted.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ApiKeyStore>,
    pub auth: Arc<AuthSettings>,
}

impl AppState {
    pub fn new(store: Arc<dyn ApiKeyStore>, auth: AuthSettings) -> Self {
        Self {
            store,
            auth: Arc::new(auth),
        }
    }
}
