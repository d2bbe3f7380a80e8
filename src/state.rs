use crate::api::{ApiClient, TodoApi};
use crate::auth::SessionStore;
use crate::config::ClientConfig;
use crate::storage::{CredentialStore, KeyringCredentialStore, MemoryCredentialStore};
use std::sync::Arc;

// Everything a command needs: the API client and the session store that
// keeps its token in sync. Both share one `ApiClient`.
#[derive(Clone)]
pub struct AppState {
    pub config: ClientConfig,
    pub api: Arc<ApiClient>,
    pub session: Arc<SessionStore>,
}

impl AppState {
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Self {
        let api = Arc::new(ApiClient::new(&config));
        let session = Arc::new(SessionStore::new(api.clone(), store));
        Self {
            config,
            api,
            session,
        }
    }

    /// Picks the keyring when the session should outlive the process,
    /// an in-memory store otherwise.
    pub fn from_config(config: ClientConfig) -> Self {
        let store: Arc<dyn CredentialStore> = if config.persist_session {
            Arc::new(KeyringCredentialStore::new(&config.keyring_account))
        } else {
            Arc::new(MemoryCredentialStore::new())
        };
        Self::new(config, store)
    }

    pub fn todo(&self) -> &dyn TodoApi {
        self.api.as_ref()
    }
}
