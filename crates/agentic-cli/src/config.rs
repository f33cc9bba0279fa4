//! Configuration file management for agentic.
//!
//! Provides an optional TOML config file at `~/.config/agentic/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use agentic_core::RetryPolicy;
use agentic_core::harness::BackendBinaries;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub retry: RetrySection,
    pub backends: BackendsSection,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    /// Overrides the per-model-tier attempt timeout.
    pub attempt_timeout_secs: Option<u64>,
}

/// Executable name or path per backend.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendsSection {
    pub claude: Option<String>,
    pub copilot: Option<String>,
    pub gemini: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the agentic config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/agentic` or `~/.config/agentic`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("agentic");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("agentic")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read
// -----------------------------------------------------------------------

/// Load and parse the config file. A missing file is `Ok(None)`; a file
/// that does not parse is an error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to read config file at {}", path.display()));
        }
    };
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(Some(config))
}

/// Read and parse an environment variable. Unset or empty is `Ok(None)`.
fn env_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{name}={raw:?} is invalid: {e}")),
        Err(_) => Ok(None),
    }
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct AgenticConfig {
    pub retry: RetryPolicy,
    pub binaries: BackendBinaries,
}

impl AgenticConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Attempts: `cli_max_attempts` > `AGENTIC_MAX_ATTEMPTS` > `retry.max_attempts` > 3
    /// - Backoff: `AGENTIC_RETRY_BASE_DELAY_MS` / `AGENTIC_RETRY_MAX_DELAY_MS` > `retry.*` > 5s / 60s
    /// - Timeout: `AGENTIC_ATTEMPT_TIMEOUT_SECS` > `retry.attempt_timeout_secs` > per tier
    /// - Binaries: `AGENTIC_{CLAUDE,COPILOT,GEMINI}_BIN` > `backends.*` > the backend name
    pub fn resolve(cli_max_attempts: Option<u32>) -> Result<Self> {
        let file = load_config()?.unwrap_or_default();
        let defaults = RetryPolicy::default();

        let max_attempts = match cli_max_attempts {
            Some(n) => n,
            None => env_var("AGENTIC_MAX_ATTEMPTS")?
                .or(file.retry.max_attempts)
                .unwrap_or(defaults.max_attempts),
        };
        if max_attempts == 0 {
            bail!("max attempts must be at least 1");
        }

        let base_delay = env_var("AGENTIC_RETRY_BASE_DELAY_MS")?
            .or(file.retry.base_delay_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.base_delay);
        let max_delay = env_var("AGENTIC_RETRY_MAX_DELAY_MS")?
            .or(file.retry.max_delay_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_delay);
        let attempt_timeout = env_var("AGENTIC_ATTEMPT_TIMEOUT_SECS")?
            .or(file.retry.attempt_timeout_secs)
            .map(Duration::from_secs);
        if attempt_timeout == Some(Duration::ZERO) {
            bail!("attempt timeout must be at least 1 second");
        }

        let fallback = BackendBinaries::default();
        let binaries = BackendBinaries {
            claude: env_var("AGENTIC_CLAUDE_BIN")?
                .or(file.backends.claude)
                .unwrap_or(fallback.claude),
            copilot: env_var("AGENTIC_COPILOT_BIN")?
                .or(file.backends.copilot)
                .unwrap_or(fallback.copilot),
            gemini: env_var("AGENTIC_GEMINI_BIN")?
                .or(file.backends.gemini)
                .unwrap_or(fallback.gemini),
        };

        Ok(Self {
            retry: RetryPolicy {
                max_attempts,
                base_delay,
                max_delay,
                attempt_timeout,
            },
            binaries,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
