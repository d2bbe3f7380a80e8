use anyhow::{Context, Result};
use reqwest::Url;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_ACCOUNT: &str = "default";

const ENV_API_URL: &str = "TASKCHAT_API_URL";
const ENV_TIMEOUT_SECS: &str = "TASKCHAT_TIMEOUT_SECS";
const ENV_ACCOUNT: &str = "TASKCHAT_ACCOUNT";

/// Connection settings shared by the API client and the session store.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    /// Deadline for a whole request/response exchange.
    pub timeout: Duration,
    /// Keyring "username" the session token is filed under.
    pub keyring_account: String,
    /// Whether the bearer token survives the process via the OS keyring.
    pub persist_session: bool,
}

impl ClientConfig {
    pub fn new(api_url: &str) -> Result<Self> {
        Ok(Self {
            api_url: parse_api_url(api_url)?,
            timeout: DEFAULT_TIMEOUT,
            keyring_account: DEFAULT_ACCOUNT.to_string(),
            persist_session: true,
        })
    }

    /// Reads `TASKCHAT_API_URL`, `TASKCHAT_TIMEOUT_SECS` and `TASKCHAT_ACCOUNT`,
    /// falling back to the defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = lookup(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let mut config = Self::new(&api_url)
            .with_context(|| format!("Invalid {} '{}'", ENV_API_URL, api_url))?;

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().with_context(|| {
                format!("Failed to parse {} '{}' as seconds", ENV_TIMEOUT_SECS, raw)
            })?;
            config = config
                .with_timeout_secs(secs)
                .with_context(|| format!("Invalid {} '{}'", ENV_TIMEOUT_SECS, raw))?;
        }
        if let Some(account) = lookup(ENV_ACCOUNT).filter(|a| !a.trim().is_empty()) {
            config.keyring_account = account;
        }
        log::debug!(
            "Client config: api_url={} timeout={:?} account={}",
            config.api_url,
            config.timeout,
            config.keyring_account
        );
        Ok(config)
    }

    pub fn with_api_url(mut self, api_url: &str) -> Result<Self> {
        self.api_url = parse_api_url(api_url)?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whole-second timeout from user input. Zero would fail every request.
    pub fn with_timeout_secs(self, secs: u64) -> Result<Self> {
        if secs == 0 {
            anyhow::bail!("Timeout must be at least one second");
        }
        Ok(self.with_timeout(Duration::from_secs(secs)))
    }

    pub fn with_persistence(mut self, persist: bool) -> Self {
        self.persist_session = persist;
        self
    }
}

fn parse_api_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim().trim_end_matches('/'))
        .with_context(|| format!("Failed to parse API URL '{}'", raw))?;
    if url.cannot_be_a_base() {
        anyhow::bail!("API URL '{}' cannot be used as a base URL", raw);
    }
    Ok(url)
}
