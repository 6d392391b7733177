//! Shared configuration for clashmon.
//!
//! TOML profiles layered with `CLASHMON_*` environment variables, token
//! resolution (env + plaintext), and translation to
//! `clashmon_core::CoordinatorConfig`. The CLI adds flag-aware wrappers on
//! top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use clashmon_core::config::{DEFAULT_CONCURRENCY_LIMIT, DEFAULT_POLL_INTERVAL};
use clashmon_core::{CoordinatorConfig, normalize_endpoint_url};

pub const ENV_PREFIX: &str = "CLASHMON_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("no token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named controller profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Resolve a profile by name, falling back to `default_profile`.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name, profile))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

/// Values applied to every profile unless the profile overrides them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Poll interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    #[serde(default)]
    pub streaming_checks: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            concurrency_limit: default_concurrency_limit(),
            streaming_checks: false,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    15
}
fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}
fn default_concurrency_limit() -> usize {
    DEFAULT_CONCURRENCY_LIMIT
}

/// A named controller profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Controller address, with or without scheme (e.g. "192.168.1.1:9090").
    pub endpoint: String,

    /// Bearer token (plaintext; prefer `token_env`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable holding the bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Talk HTTPS instead of HTTP.
    #[serde(default)]
    pub use_tls: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_limit: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_checks: Option<bool>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "clashmon", "clashmon").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("clashmon");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file, layered with `CLASHMON_*` variables.
///
/// Nested keys use a double underscore: `CLASHMON_DEFAULTS__POLL_INTERVAL`.
/// A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution (without CLI flags) ────────────────────────────

/// Resolve the bearer token: the profile's `token_env` variable first,
/// then the plaintext `token`.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_token_with(profile, profile_name, |name| std::env::var(name).ok())
}

fn resolve_token_with(
    profile: &Profile,
    profile_name: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    if let Some(value) = profile.token_env.as_deref().and_then(&lookup) {
        return Ok(SecretString::from(value));
    }
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }
    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation to the coordinator record ───────────────────────────

/// Build a `CoordinatorConfig` from a profile and the global defaults,
/// without CLI flag overrides.
pub fn profile_to_coordinator_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<CoordinatorConfig, ConfigError> {
    let token = resolve_token(profile, profile_name)?;
    build_coordinator_config(profile, defaults, token)
}

/// Same as [`profile_to_coordinator_config`] with an already resolved token.
pub fn build_coordinator_config(
    profile: &Profile,
    defaults: &Defaults,
    token: SecretString,
) -> Result<CoordinatorConfig, ConfigError> {
    let endpoint_url =
        normalize_endpoint_url(&profile.endpoint, profile.use_tls).map_err(|e| ConfigError::Validation {
            field: "endpoint".into(),
            reason: e.to_string(),
        })?;

    let mut config = CoordinatorConfig::new(endpoint_url, token);
    config.allow_insecure_tls = profile.insecure.unwrap_or(defaults.insecure);
    config.request_timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.poll_interval = Duration::from_secs(profile.poll_interval.unwrap_or(defaults.poll_interval));
    config.concurrency_limit = profile.concurrency_limit.unwrap_or(defaults.concurrency_limit);
    config.streaming_checks_enabled = profile.streaming_checks.unwrap_or(defaults.streaming_checks);
    Ok(config.clamped())
}
