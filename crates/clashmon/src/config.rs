//! CLI-aware configuration: resolves the active profile and layers the
//! global flags on top of it.
//!
//! Core never sees these types -- it receives a pre-built
//! `CoordinatorConfig`.

use std::time::Duration;

use secrecy::SecretString;

use clashmon_config::{Config, Profile, build_coordinator_config, resolve_token};
use clashmon_core::CoordinatorConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use clashmon_config::{config_path, load_config_or_default, save_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-separated list of configured profile names.
pub fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        "(none)".into()
    } else {
        config.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Build a `CoordinatorConfig` from the config file, profile, and CLI
/// overrides. Flags win over the profile; the profile wins over defaults.
pub fn resolve(global: &GlobalOpts) -> Result<CoordinatorConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let (profile, token) = match cfg.profiles.get(&profile_name) {
        Some(profile) => {
            let mut profile = profile.clone();
            if let Some(ref endpoint) = global.endpoint {
                profile.endpoint.clone_from(endpoint);
                profile.use_tls = global.tls;
            }
            let token = match global.token {
                Some(ref token) => SecretString::from(token.clone()),
                None => resolve_token(&profile, &profile_name)?,
            };
            (profile, token)
        }
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        None => {
            let endpoint = global.endpoint.clone().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?;
            let token = global
                .token
                .clone()
                .map(SecretString::from)
                .ok_or(CliError::NoCredentials {
                    profile: profile_name,
                })?;
            let profile = Profile {
                endpoint,
                use_tls: global.tls,
                ..Profile::default()
            };
            (profile, token)
        }
    };

    let mut config = build_coordinator_config(&profile, &cfg.defaults, token)?;
    if global.insecure {
        config.allow_insecure_tls = true;
    }
    if let Some(secs) = global.timeout {
        config.request_timeout = Duration::from_secs(secs);
    }
    if global.streaming {
        config.streaming_checks_enabled = true;
    }
    Ok(config)
}
