//! Configuration loading and the account credential artifact.
//!
//! Settings load from `./loki.toml` (or `$LOKI_CONFIG_PATH`); environment
//! variables override file values; file values override defaults.
//!
//! Credentials live in a separate `account.info` JSON artifact. A missing or
//! malformed artifact degrades to empty credentials rather than aborting:
//! the remote service rejects the next call and that rejection is reported
//! as data, like every other failure in this crate.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

/// Production endpoint of the Loki bulk matching API.
pub const DEFAULT_ENDPOINT: &str = "https://api.droidtown.co/Loki/BulkAPI/";

/// Maximum number of input items the remote service accepts per request.
pub const DEFAULT_INPUT_LIMIT: usize = 20;

/// Default filename of the credential artifact.
pub const DEFAULT_ACCOUNT_PATH: &str = "account.info";

// ── Settings ────────────────────────────────────────────────────

/// Client settings loaded from TOML.
///
/// Path: `./loki.toml` or `$LOKI_CONFIG_PATH`.
/// Env vars override file values; file values override defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// URL of the bulk matching endpoint.
    pub endpoint: String,
    /// Per-request input item limit enforced by the batch orchestrator.
    pub input_limit: usize,
    /// Default intent filter applied when a call site passes an empty one.
    /// Empty means "match against all known intents".
    pub intent_filter: Vec<String>,
    /// Path of the `account.info` credential artifact.
    pub account_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            input_limit: DEFAULT_INPUT_LIMIT,
            intent_filter: Vec::new(),
            account_path: PathBuf::from(DEFAULT_ACCOUNT_PATH),
        }
    }
}

impl Settings {
    /// Load settings with precedence: env vars > TOML file > defaults.
    ///
    /// If the file does not exist, defaults are used.
    ///
    /// # Errors
    ///
    /// Returns an error when the config file exists but cannot be read or
    /// parsed.
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from_file()?;
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Load from the TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                info!(path = %path.display(), "loading settings from file");
                Self::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no settings file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read settings file: {e}")),
        }
    }

    /// Resolve the settings file path using a custom env resolver.
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("LOKI_CONFIG_PATH").map_or_else(|| PathBuf::from("loki.toml"), PathBuf::from)
    }

    /// Apply environment variable overrides (env > file > defaults).
    ///
    /// Takes a resolver function so tests never touch the process
    /// environment. Invalid values are logged and ignored.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("LOKI_ENDPOINT") {
            match Url::parse(&v) {
                Ok(_) => self.endpoint = v,
                Err(_) => warn!(
                    var = "LOKI_ENDPOINT",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("LOKI_INPUT_LIMIT") {
            match v.parse::<usize>() {
                Ok(n) if n > 0 => self.input_limit = n,
                _ => warn!(
                    var = "LOKI_INPUT_LIMIT",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("LOKI_INTENT_FILTER") {
            self.intent_filter = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(v) = env("LOKI_ACCOUNT_PATH") {
            self.account_path = PathBuf::from(v);
        }
    }

    /// Parse a TOML string into settings (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error when the string is not valid TOML for this schema.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(toml_str).context("failed to parse settings TOML")?;
        Ok(settings)
    }
}

// ── Account credentials ─────────────────────────────────────────

/// Credentials for the remote service, from the `account.info` artifact.
///
/// An unconfigured account (empty strings) is a valid state: the next
/// remote call fails with an auth rejection that is captured as data.
#[derive(Clone, Default, Deserialize)]
pub struct Account {
    /// Account username.
    pub username: String,
    /// API key issued for the account.
    pub loki_key: String,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("loki_key", &"[REDACTED]")
            .finish()
    }
}

impl Account {
    /// Load the account artifact, degrading to empty credentials on any
    /// failure. `LOKI_USERNAME` / `LOKI_KEY` env vars override file values.
    pub fn load(path: &Path) -> Self {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load with a custom env resolver (for testing).
    pub fn load_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Self {
        let mut account = match Self::from_file(path) {
            Ok(account) => account,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "account artifact unavailable, falling back to empty credentials"
                );
                Self::default()
            }
        };
        if let Some(v) = env("LOKI_USERNAME") {
            account.username = v;
        }
        if let Some(v) = env("LOKI_KEY") {
            account.loki_key = v;
        }
        account
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let account: Account = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(account)
    }

    /// Whether both credential fields are non-empty.
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() && !self.loki_key.is_empty()
    }
}
