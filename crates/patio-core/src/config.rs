//! Configuration resolution for Patio.
//!
//! Implements layered config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/patio/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (applied by the binary, highest priority)
//!
//! Secrets never live in these files. They are resolved separately through
//! [`Secret`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Complete Patio configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub amqp: AmqpConfig,
    pub auth: AuthConfig,
    pub sync: SyncConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` file. `None` means `~/.patio/hub.db`.
    pub path: Option<PathBuf>,
}

/// Message broker settings. The password is a secret (`PATIO_AMQP_PASSWORD`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmqpConfig {
    /// Broker address (`amqp://host:port` or `amqps://`). Credentials and
    /// vhost are taken from `login`, the password secret and `vhost`.
    pub url: String,
    pub login: String,
    pub vhost: String,
    /// Queue the devices consume configuration updates from.
    pub queue: String,
    pub durable: bool,
}

impl Default for AmqpConfig {
    fn default() -> Self {
        Self {
            url: "amqp://localhost:5672".to_string(),
            login: "guest".to_string(),
            vhost: "/".to_string(),
            queue: "patio.config".to_string(),
            durable: false,
        }
    }
}

/// Token issuance settings. The signing key is a secret (`PATIO_JWT_SECRET`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 10 * 60,
        }
    }
}

/// Configuration-sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on each storage or publish call.
    pub op_timeout_secs: u64,
    /// Publish attempts before reverting. 1 disables retry.
    pub notify_attempts: u32,
    /// First retry delay, doubled per attempt.
    pub retry_backoff_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            op_timeout_secs: 5,
            notify_attempts: 1,
            retry_backoff_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Load configuration with layered resolution from the process environment.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let global = global_config_path().filter(|p| p.exists());
    load_config_from(global.as_deref(), explicit, |key| std::env::var(key).ok())
}

/// Load configuration from the given files and an environment lookup.
///
/// Files are merged key by key, so a file only needs the keys it changes.
/// A missing explicit file is an error; a missing global file is skipped by
/// [`load_config`].
pub fn load_config_from(
    global: Option<&Path>,
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config> {
    let mut merged = serde_json::to_value(Config::default())?;

    for path in [global, explicit].into_iter().flatten() {
        merge_json(&mut merged, load_config_file(path)?);
    }

    let mut config: Config = serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))?;
    apply_env_overrides(&mut config, env);
    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("patio").join("settings.json"))
}

/// Default database location when none is configured.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".patio").join("hub.db"))
}

fn load_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_json(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn apply_env_overrides(config: &mut Config, env: impl Fn(&str) -> Option<String>) {
    if let Some(val) = env("PATIO_DB_PATH") {
        config.database.path = Some(PathBuf::from(val));
    }
    if let Some(val) = env("PATIO_AMQP_URL") {
        config.amqp.url = val;
    }
    if let Some(val) = env("PATIO_AMQP_LOGIN") {
        config.amqp.login = val;
    }
    if let Some(val) = env("PATIO_AMQP_QUEUE") {
        config.amqp.queue = val;
    }
    if let Some(n) = env("PATIO_TOKEN_TTL").and_then(|v| v.parse().ok()) {
        config.auth.token_ttl_secs = n;
    }
    if let Some(n) = env("PATIO_OP_TIMEOUT").and_then(|v| v.parse().ok()) {
        config.sync.op_timeout_secs = n;
    }
    if let Some(val) = env("PATIO_LOG_LEVEL") {
        config.log.level = val;
    }
}

/// A deployment secret (signing key, broker password).
///
/// Resolved from `<NAME>` or from the file named by `<NAME>_FILE`, the way
/// container secrets are mounted. There is no fallback value.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    /// Resolve a secret from the process environment.
    pub fn resolve(name: &str) -> Result<Self> {
        Self::resolve_with(name, |key| std::env::var(key).ok())
    }

    pub fn resolve_with(name: &str, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = env(name).filter(|v| !v.is_empty()) {
            return Ok(Self(value));
        }
        if let Some(path) = env(&format!("{name}_FILE")) {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("Failed to read secret file {path}: {e}"))
            })?;
            let value = content.trim();
            if !value.is_empty() {
                return Ok(Self(value.to_string()));
            }
        }
        Err(Error::MissingSecret(name.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}
