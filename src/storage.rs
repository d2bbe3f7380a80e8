use crate::models::Session;
use anyhow::{Context, Result};
use keyring::Entry;
use std::sync::Mutex;

const KEYRING_SERVICE: &str = "taskchat_session";

/// Where the session (user and bearer token) lives between process runs.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>>;
    fn save(&self, session: &Session) -> Result<()>;
    /// Clearing a store that holds nothing succeeds.
    fn clear(&self) -> Result<()>;
}

/// Session kept in the OS keyring as JSON, one entry per account.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    account: String,
}

impl KeyringCredentialStore {
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(KEYRING_SERVICE, &self.account).context("Failed to create keyring entry")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn load(&self) -> Result<Option<Session>> {
        log::debug!("Reading session from keyring for account: {}", self.account);
        let raw = match self.entry()?.get_password() {
            Ok(raw) => raw,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => {
                return Err(e).context(format!(
                    "Failed to read session from keyring for '{}'",
                    self.account
                ))
            }
        };
        let session = serde_json::from_str(&raw).context("Stored session is not valid JSON")?;
        Ok(Some(session))
    }

    fn save(&self, session: &Session) -> Result<()> {
        log::debug!("Storing session in keyring for account: {}", self.account);
        let raw = serde_json::to_string(session).context("Failed to serialize session")?;
        self.entry()?.set_password(&raw).context(format!(
            "Failed to store session in keyring for '{}'",
            self.account
        ))?;
        // A fresh entry must see the write, otherwise the backend keeps nothing
        match self.entry()?.get_password() {
            Ok(_) => Ok(()),
            Err(e) => Err(e).context(format!(
                "Keyring did not retain the session for '{}'",
                self.account
            )),
        }
    }

    fn clear(&self) -> Result<()> {
        log::debug!("Removing session from keyring for account: {}", self.account);
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context(format!(
                "Failed to remove session from keyring for '{}'",
                self.account
            )),
        }
    }
}

/// Process-local store; nothing outlives the process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    session: Mutex<Option<Session>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self.session.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use chrono::{TimeZone, Utc};

    fn session(token: &str) -> Session {
        Session {
            user: User {
                id: "u1".into(),
                email: "a@example.com".into(),
                name: None,
                created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            },
            access_token: token.into(),
        }
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.save(&session("tok-1")).unwrap();
        assert_eq!(store.load().unwrap().map(|s| s.access_token).as_deref(), Some("tok-1"));
        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn keyring_store_round_trip() {
        let store = KeyringCredentialStore::new(&format!("test-{}", uuid::Uuid::new_v4()));
        let saved = session("tok-keyring");

        if let Err(e) = store.save(&saved) {
            match e.downcast_ref::<keyring::Error>() {
                // Sandboxed hosts (no secret service, keyctl filtered) have no usable keyring
                Some(keyring::Error::PlatformFailure(_))
                | Some(keyring::Error::NoStorageAccess(_)) => {
                    eprintln!("Skipping keyring round trip: {:#}", e);
                    return;
                }
                _ => panic!("keyring store lost the session it just saved: {:#}", e),
            }
        }

        // A second handle on the same account reads what the first wrote
        let other = KeyringCredentialStore::new(&store.account);
        assert_eq!(other.load().unwrap(), Some(saved));

        other.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }
}
