//! Runtime settings.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, `ECP_*` environment variables, command-line flags. Values stay raw
//! until [`Settings::finalize`] validates them.

use crate::services::copy::DestinationLayout;
use crate::services::resolve::{DEFAULT_PORT, Port};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "ECP_API_URL";
pub const ENV_PORT: &str = "ECP_PORT";

/// Settings as read from files, environment and flags.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub api_url: String,
    pub port: u16,
    pub layout: DestinationLayout,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            port: DEFAULT_PORT,
            layout: DestinationLayout::Mirror,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Validated settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    pub api_url: String,
    pub port: Port,
    pub layout: DestinationLayout,
    pub request_timeout: Duration,
}

/// Overrides collected from command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub api_url: Option<String>,
    pub port: Option<String>,
    pub layout: Option<String>,
}

impl Settings {
    /// Parse settings from TOML text. Missing keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::InvalidInput(format!("invalid config: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidInput(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = parse_port_number(ENV_PORT, &port)?;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &SettingsOverrides) -> Result<()> {
        if let Some(url) = &overrides.api_url {
            self.api_url.clone_from(url);
        }
        if let Some(port) = &overrides.port {
            self.port = parse_port_number("--port", port)?;
        }
        if let Some(layout) = &overrides.layout {
            self.layout = DestinationLayout::parse(layout)?;
        }
        Ok(())
    }

    /// Load defaults, then `config` if given, then the process environment,
    /// then `overrides`.
    pub fn load(config: Option<&Path>, overrides: &SettingsOverrides) -> Result<Self> {
        let mut settings = match config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.apply_overrides(overrides)?;
        log::debug!("Effective settings: {settings:?}");
        Ok(settings)
    }

    /// # Errors
    /// [`Error::WellKnownPort`] for ports 0-1023, [`Error::InvalidInput`] for
    /// an empty backend URL or a zero timeout.
    pub fn finalize(&self) -> Result<ResolvedSettings> {
        let port = Port::new(self.port)?;
        if self.api_url.trim().is_empty() {
            return Err(Error::InvalidInput("api_url must not be empty".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(ResolvedSettings {
            api_url: self.api_url.trim().to_string(),
            port,
            layout: self.layout,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }
}

fn parse_port_number(source: &str, text: &str) -> Result<u16> {
    text.trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("{source}: invalid port '{text}'")))
}
