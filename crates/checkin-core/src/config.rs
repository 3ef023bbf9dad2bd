//! Service configuration.
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional JSON file named by `CHECKIN_CONFIG`, and individual
//! environment variables. Callers load `.env` before calling `Config::load`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Env var naming the optional JSON config file
const CONFIG_PATH_VAR: &str = "CHECKIN_CONFIG";

const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Timeout for calls to the hosted database.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Hosted database over REST.
    #[default]
    Hosted,
    /// In-process store; data is lost on exit.
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" => Ok(Backend::Hosted),
            "memory" => Ok(Backend::Memory),
            other => Err(anyhow::anyhow!("Unknown backend '{}' (expected hosted or memory)", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub database_url: Option<String>,
    pub service_key: Option<String>,
    pub anon_key: Option<String>,
    pub bind: String,
    pub request_timeout_secs: u64,
    pub static_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    /// `token=user[:email]` pairs accepted without the auth service.
    pub dev_tokens: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            database_url: None,
            service_key: None,
            anon_key: None,
            bind: DEFAULT_BIND.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            static_dir: None,
            log_dir: None,
            dev_tokens: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Override fields from environment variables looked up through `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(backend) = non_empty("CHECKIN_BACKEND") {
            self.backend = backend.parse()?;
        }
        if let Some(url) = non_empty("SUPABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(key) = non_empty("SUPABASE_SERVICE_ROLE_KEY") {
            self.service_key = Some(key);
        }
        if let Some(key) = non_empty("SUPABASE_ANON_KEY") {
            self.anon_key = Some(key);
        }
        if let Some(bind) = non_empty("CHECKIN_BIND") {
            self.bind = bind;
        }
        if let Some(secs) = non_empty("CHECKIN_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid CHECKIN_REQUEST_TIMEOUT_SECS: {}", secs))?;
        }
        if let Some(dir) = non_empty("CHECKIN_STATIC_DIR") {
            self.static_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = non_empty("CHECKIN_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(tokens) = non_empty("CHECKIN_DEV_TOKENS") {
            self.dev_tokens = Some(tokens);
        }
        Ok(())
    }

    /// The hosted backend needs its URL and both keys.
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;
        if self.backend == Backend::Hosted {
            for (name, value) in [
                ("SUPABASE_URL", &self.database_url),
                ("SUPABASE_SERVICE_ROLE_KEY", &self.service_key),
                ("SUPABASE_ANON_KEY", &self.anon_key),
            ] {
                if value.is_none() {
                    anyhow::bail!("{} must be set for the hosted backend", name);
                }
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.bind))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
