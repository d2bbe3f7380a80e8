//! Session store: the one authenticated identity this client holds.
//!
//! The store keeps the API client's bearer token in step with the session.
//! Signing in or up sets it, signing out clears it, and a 401 from any data
//! operation clears it on the client side. A session whose token no longer
//! matches the client's reads as signed out.

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::models::{ApiErrorBody, AuthPayload, Session, User};
use crate::storage::CredentialStore;
use reqwest::Method;
use serde::Serialize;
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The backend refused the credentials or the registration.
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

pub struct SessionStore {
    api: Arc<ApiClient>,
    store: Arc<dyn CredentialStore>,
    current: Mutex<Option<Session>>,
}

impl SessionStore {
    pub fn new(api: Arc<ApiClient>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            api,
            store,
            current: Mutex::new(None),
        }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<Session, AuthError> {
        let body = SignUpRequest {
            email,
            password,
            name,
        };
        self.authenticate("signup", &body, "Signup failed").await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let body = SignInRequest { email, password };
        self.authenticate("signin", &body, "Invalid credentials").await
    }

    // Shared by signin and signup. These calls carry no bearer token, and a
    // failure leaves whatever session was there before untouched.
    async fn authenticate<B: Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &B,
        fallback: &str,
    ) -> Result<Session, AuthError> {
        let raw = self
            .api
            .execute(Method::POST, &["auth", endpoint], Some(body), None)
            .await?;

        if !raw.status.is_success() {
            let reason = serde_json::from_slice::<ApiErrorBody>(&raw.body)
                .ok()
                .and_then(|body| body.describe())
                .unwrap_or_else(|| fallback.to_string());
            log::warn!("auth/{} rejected with status {}: {}", endpoint, raw.status, reason);
            return Err(AuthError::Rejected(reason));
        }

        let payload: AuthPayload = serde_json::from_slice(&raw.body)
            .map_err(|e| ApiError::decode(raw.status, e))?;
        let session = payload
            .into_session()
            .ok_or_else(|| AuthError::Rejected(fallback.to_string()))?;

        log::info!("Signed in as user {}", session.user.id);
        self.establish(session.clone());
        Ok(session)
    }

    fn establish(&self, session: Session) {
        {
            // Token and session change together under the session lock, so
            // `sync_with_client` never sees one without the other
            let mut current = self.lock();
            self.api.set_token(Some(session.access_token.clone()));
            *current = Some(session.clone());
        }
        if let Err(e) = self.store.save(&session) {
            log::warn!("Session was not persisted: {:?}", e);
        }
    }

    /// Ends the session. The backend is notified on a best-effort basis;
    /// whatever happens there, local state ends up cleared.
    pub async fn sign_out(&self) {
        let token = self.api.token();
        if token.is_some() {
            match self
                .api
                .execute(Method::POST, &["auth", "signout"], None::<&()>, token.as_deref())
                .await
            {
                Ok(raw) if raw.status.is_success() => {}
                Ok(raw) => log::warn!("Ignoring signout response with status {}", raw.status),
                Err(e) => log::warn!("Ignoring signout failure: {}", e),
            }
        }

        {
            let mut current = self.lock();
            *current = None;
            self.api.set_token(None);
        }
        if let Err(e) = self.store.clear() {
            log::warn!("Failed to drop persisted session: {:?}", e);
        }
        log::info!("Signed out");
    }

    /// Recovers a session after a restart. The persisted session's token is
    /// checked against `GET /auth/session`; a 2xx keeps it (preferring the
    /// session the backend echoes, if any), anything else yields `None`.
    pub async fn restore_session(&self) -> Option<Session> {
        if let Some(session) = self.session() {
            return Some(session);
        }

        let stored = match self.store.load() {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                log::debug!("No persisted session");
                return None;
            }
            Err(e) => {
                log::warn!("Could not read persisted session: {:?}", e);
                return None;
            }
        };

        let raw = match self
            .api
            .execute(
                Method::GET,
                &["auth", "session"],
                None::<&()>,
                Some(&stored.access_token),
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Session probe failed: {}", e);
                return None;
            }
        };

        if !raw.status.is_success() {
            log::info!("Session probe rejected with status {}", raw.status);
            if raw.status == reqwest::StatusCode::UNAUTHORIZED {
                if let Err(e) = self.store.clear() {
                    log::warn!("Failed to drop rejected session: {:?}", e);
                }
            }
            return None;
        }

        let payload = match serde_json::from_slice::<AuthPayload>(&raw.body) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("Session probe returned an unexpected body: {}", e);
                return None;
            }
        };
        // A stateless backend accepts the token without echoing a session
        let session = payload.into_session().unwrap_or(stored);
        log::info!("Restored session for user {}", session.user.id);
        self.establish(session.clone());
        Some(session)
    }

    /// The current session, if the API client still holds its token.
    pub fn session(&self) -> Option<Session> {
        self.sync_with_client();
        self.lock().clone()
    }

    /// Drops the session, and its persisted copy, when a 401 has cleared the
    /// client's token since it was established. Returns whether a session
    /// was dropped.
    pub fn sync_with_client(&self) -> bool {
        let mut current = self.lock();
        let token = self.api.token();
        let stale = match (&*current, token.as_deref()) {
            (Some(session), Some(token)) => session.access_token != token,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if stale {
            log::info!("Session token was cleared; dropping session");
            *current = None;
            if let Err(e) = self.store.clear() {
                log::warn!("Failed to drop persisted session: {:?}", e);
            }
        }
        stale
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    pub fn user(&self) -> Option<User> {
        self.session().map(|s| s.user)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
