//! Configuration loading.
//!
//! Precedence, lowest first: defaults, TOML file, `HUB_*` environment,
//! command line flags.

use anyhow::{Context, Result};
use hub_core::config::humantime_serde::parse_duration;
use hub_core::HubConfig;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

use crate::cli::Args;

/// Build the effective configuration and validate it.
pub fn load_config<F>(args: &Args, lookup: F) -> Result<HubConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match &args.config {
        Some(path) => read_file(path)?,
        None => HubConfig::default(),
    };

    apply_env_overrides(&mut config, lookup);

    if let Some(host) = args.host {
        config.http.host = host;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<HubConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
}

fn parsed<T: FromStr>(key: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

fn duration(key: &str, raw: Option<String>) -> Option<std::time::Duration> {
    let raw = raw?;
    match parse_duration(&raw) {
        Ok(value) => Some(value),
        Err(reason) => {
            warn!(variable = key, value = %raw, reason, "Ignoring unparseable environment override");
            None
        }
    }
}

/// Apply `HUB_*` environment overrides.
pub fn apply_env_overrides<F>(config: &mut HubConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(host) = parsed("HUB_HOST", get("HUB_HOST")) {
        config.http.host = host;
    }
    if let Some(port) = parsed("HUB_PORT", get("HUB_PORT")) {
        config.http.port = port;
    }
    if let Some(limit) = parsed("HUB_MAX_BODY_BYTES", get("HUB_MAX_BODY_BYTES")) {
        config.http.max_body_bytes = limit;
    }
    if let Some(interval) = duration("HUB_VERIFY_RETRY_INTERVAL", get("HUB_VERIFY_RETRY_INTERVAL")) {
        config.verification.retry_interval = interval;
    }
    if let Some(attempts) = parsed("HUB_VERIFY_MAX_ATTEMPTS", get("HUB_VERIFY_MAX_ATTEMPTS")) {
        config.verification.max_attempts = attempts;
    }
    if let Some(backoff) = duration("HUB_DELIVERY_MAX_BACKOFF", get("HUB_DELIVERY_MAX_BACKOFF")) {
        config.delivery.max_backoff = backoff;
    }
    if let Some(lease) = duration("HUB_DEFAULT_LEASE", get("HUB_DEFAULT_LEASE")) {
        config.lease.default_lease = Some(lease);
    }
    if let Some(agent) = get("HUB_USER_AGENT") {
        config.fetch.user_agent = agent;
    }
}
