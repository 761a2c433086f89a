use std::{collections::HashMap, fs, time::Duration};

use anyhow::{bail, Context, Result};
use url::Url;

const SETTINGS_FILE: &str = "recipients.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    /// Applied to every store request; expiry surfaces as a remote failure.
    pub request_timeout: Duration,
    pub revision_poll_interval: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            request_timeout: Duration::from_secs(10),
            revision_poll_interval: Duration::from_millis(1500),
        }
    }
}

impl ClientSettings {
    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Result<Self> {
        self.server_url = validate_server_url(&server_url.into())?;
        Ok(self)
    }
}

pub fn load_client_settings() -> Result<ClientSettings> {
    let file_cfg = match fs::read_to_string(SETTINGS_FILE) {
        Ok(raw) => toml::from_str::<HashMap<String, toml::Value>>(&raw)
            .with_context(|| format!("failed to parse {SETTINGS_FILE}"))?,
        Err(_) => HashMap::new(),
    };
    settings_from_sources(&file_cfg, |key| std::env::var(key).ok())
}

/// Layers defaults, then the settings file, then the environment.
fn settings_from_sources(
    file_cfg: &HashMap<String, toml::Value>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    if let Some(v) = file_cfg.get("server_url").and_then(toml::Value::as_str) {
        settings.server_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("request_timeout_secs").and_then(toml::Value::as_integer) {
        settings.request_timeout = Duration::from_secs(non_negative(v, "request_timeout_secs")?);
    }
    if let Some(v) = file_cfg.get("revision_poll_ms").and_then(toml::Value::as_integer) {
        settings.revision_poll_interval =
            Duration::from_millis(non_negative(v, "revision_poll_ms")?);
    }

    if let Some(v) = env("RECIPIENTS_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        let secs = v
            .parse::<u64>()
            .with_context(|| format!("APP__REQUEST_TIMEOUT_SECS is not a number: {v}"))?;
        settings.request_timeout = Duration::from_secs(secs);
    }
    if let Some(v) = env("APP__REVISION_POLL_MS") {
        let millis = v
            .parse::<u64>()
            .with_context(|| format!("APP__REVISION_POLL_MS is not a number: {v}"))?;
        settings.revision_poll_interval = Duration::from_millis(millis);
    }

    settings.server_url = validate_server_url(&settings.server_url)?;
    if settings.revision_poll_interval.is_zero() {
        bail!("revision poll interval must be greater than zero");
    }
    Ok(settings)
}

fn non_negative(value: i64, key: &str) -> Result<u64> {
    u64::try_from(value).with_context(|| format!("{key} must not be negative"))
}

fn validate_server_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).with_context(|| format!("invalid server url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("server url '{raw}' must use http or https");
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
