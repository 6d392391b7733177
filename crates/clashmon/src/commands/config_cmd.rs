//! Config subcommand handlers.

use std::fmt::Write as _;

use dialoguer::{Confirm, Input, Password};
use secrecy::SecretString;

use clashmon_config::{Config, Profile, build_coordinator_config};
use clashmon_core::{Coordinator, CoreError};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const SETTABLE_KEYS: &str =
    "endpoint, token, token_env, use_tls, insecure, timeout, poll_interval, concurrency_limit, streaming_checks";

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking the token.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let d = &cfg.defaults;
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", d.output);
    let _ = writeln!(out, "color = \"{}\"", d.color);
    let _ = writeln!(out, "insecure = {}", d.insecure);
    let _ = writeln!(out, "timeout = {}", d.timeout);
    let _ = writeln!(out, "poll_interval = {}", d.poll_interval);
    let _ = writeln!(out, "concurrency_limit = {}", d.concurrency_limit);
    let _ = writeln!(out, "streaming_checks = {}", d.streaming_checks);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "endpoint = \"{}\"", p.endpoint);
        let _ = writeln!(out, "use_tls = {}", p.use_tls);
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"****\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(interval) = p.poll_interval {
            let _ = writeln!(out, "poll_interval = {interval}");
        }
        if let Some(limit) = p.concurrency_limit {
            let _ = writeln!(out, "concurrency_limit = {limit}");
        }
        if let Some(streaming) = p.streaming_checks {
            let _ = writeln!(out, "streaming_checks = {streaming}");
        }
    }

    out
}

/// Copy of the config with every plaintext token masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some("****".into());
        }
    }
    cfg
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, expected: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: key.into(),
        reason: format!("must be {expected}"),
    })
}

/// Apply `key = value` to a profile.
fn set_profile_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "endpoint" => profile.endpoint = value,
        "token" | "secret" => profile.token = Some(value),
        "token_env" | "token-env" => profile.token_env = Some(value),
        "use_tls" | "use-tls" | "tls" => profile.use_tls = parse_value(key, &value, "'true' or 'false'")?,
        "insecure" => profile.insecure = Some(parse_value(key, &value, "'true' or 'false'")?),
        "timeout" => profile.timeout = Some(parse_value(key, &value, "a number (seconds)")?),
        "poll_interval" | "poll-interval" => {
            profile.poll_interval = Some(parse_value(key, &value, "a number (seconds)")?);
        }
        "concurrency_limit" | "concurrency-limit" => {
            profile.concurrency_limit = Some(parse_value(key, &value, "a positive integer")?);
        }
        "streaming_checks" | "streaming-checks" => {
            profile.streaming_checks = Some(parse_value(key, &value, "'true' or 'false'")?);
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!("unknown config key '{other}'. Valid keys: {SETTABLE_KEYS}"),
            });
        }
    }
    Ok(())
}

/// Strict `GET version` against the candidate profile.
async fn validate_profile(profile: &Profile, cfg: &Config, token: SecretString) -> Result<String, CliError> {
    let coordinator_config = build_coordinator_config(profile, &cfg.defaults, token)?;
    let coordinator = Coordinator::new(coordinator_config);
    let result = coordinator.client().check_connection().await;
    coordinator.shutdown().await;

    match result {
        Ok(version) => Ok(format!("{} {}", version.variant(), version.version_or_unknown())),
        Err(e) => {
            let err = CoreError::from(e);
            Err(CliError::NotReady {
                key: err.setup_error_key(),
                kind: err.kind(),
                reason: err.to_string(),
            })
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global).await,

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(&global.output, &redacted(&cfg), format_config_redacted, |c| {
                c.profiles.keys().cloned().collect::<Vec<_>>().join("\n")
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);

            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            set_profile_key(profile, &key, value)?;

            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Set {key} on profile '{profile_name}'");
            }
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: clashmon config init");
            } else {
                for (name, profile) in &cfg.profiles {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}\t{}", profile.endpoint);
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();

            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: config::available_profiles(&cfg),
                });
            }

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }
    }
}

/// Interactive wizard: prompt, validate against the controller, save.
async fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("clashmon configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let endpoint: String = Input::new()
        .with_prompt("Controller address (host:port)")
        .default("127.0.0.1:9090".into())
        .interact_text()
        .map_err(prompt_err)?;

    let use_tls = Confirm::new()
        .with_prompt("Use HTTPS?")
        .default(false)
        .interact()
        .map_err(prompt_err)?;

    let secret = Password::new()
        .with_prompt("Controller secret (empty if none)")
        .allow_empty_password(true)
        .interact()
        .map_err(prompt_err)?;

    let profile = Profile {
        endpoint,
        use_tls,
        token: Some(secret.clone()),
        ..Profile::default()
    };

    let mut cfg = config::load_config_or_default();

    match validate_profile(&profile, &cfg, SecretString::from(secret)).await {
        Ok(core) => eprintln!("   Connected: {core}"),
        Err(CliError::Validation { field, reason }) => return Err(CliError::Validation { field, reason }),
        Err(e) => {
            eprintln!("   {e}");
            let save_anyway = global.yes
                || Confirm::new()
                    .with_prompt("Save the profile anyway?")
                    .default(false)
                    .interact()
                    .map_err(prompt_err)?;
            if !save_anyway {
                return Err(e);
            }
        }
    }

    cfg.profiles.insert(profile_name.clone(), profile);
    if cfg.default_profile.is_none() || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }
    config::save_config(&cfg)?;

    eprintln!("\nConfiguration written to {}", config_path.display());
    eprintln!("  Profile: {profile_name}");
    eprintln!("\n  Try it: clashmon entities list");
    Ok(())
}
