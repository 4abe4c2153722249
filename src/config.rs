//! Configuration loading for CLI defaults.
//!
//! Settings resolve in this order: command-line flag, environment variable
//! (`IPUMS_API_KEY`, `IPUMS_BASE_URL`), then the config file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use ipums_extract::api::constants::{CONNECT_TIMEOUT_SECS, INITIAL_POLL_INTERVAL, READ_TIMEOUT_SECS};
use ipums_extract::{ClientConfig, WaitPolicy};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "IPUMS_API_KEY";

/// Environment variable overriding the API endpoint.
pub const BASE_URL_ENV: &str = "IPUMS_BASE_URL";

/// `key = value` file configuration.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// API key used when neither flag nor environment provides one.
    pub api_key: Option<String>,
    /// API endpoint.
    pub base_url: Option<String>,
    /// Value of the `version` query parameter.
    pub api_version: Option<String>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Total time `wait` spends before giving up.
    pub wait_timeout_secs: Option<u64>,
    /// Cap on the delay between two status checks.
    pub max_poll_interval_secs: Option<u64>,
    /// Default directory for downloaded files.
    pub download_dir: Option<PathBuf>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1..=3600)?;
        validate_range("read_timeout_secs", self.read_timeout_secs, 1..=3600)?;
        validate_range("wait_timeout_secs", self.wait_timeout_secs, 1..=604_800)?;
        validate_range("max_poll_interval_secs", self.max_poll_interval_secs, 1..=3600)?;
        if let Some(base_url) = &self.base_url
            && !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        {
            bail!("Invalid config value for `base_url`: {base_url}. Expected an http(s) URL");
        }
        Ok(())
    }
}

fn validate_range(
    field: &str,
    value: Option<u64>,
    range: std::ops::RangeInclusive<u64>,
) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !range.contains(&value) {
        bail!(
            "Invalid config value for `{field}`: {value}. Expected range: {}..={}",
            range.start(),
            range.end()
        );
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/ipums/config.toml`
/// 2. `$HOME/.config/ipums/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("ipums").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("ipums")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path) if path.exists() => Some(load_file_config(path)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_number = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_number}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let string_value = || {
            parse_string_literal(value)
                .with_context(|| format!("Invalid `{key}` value on line {line_number}"))
        };
        let integer_value = || {
            parse_integer_u64(value)
                .with_context(|| format!("Invalid `{key}` value on line {line_number}"))
        };

        match key {
            "api_key" => cfg.api_key = Some(string_value()?),
            "base_url" => cfg.base_url = Some(string_value()?),
            "api_version" => cfg.api_version = Some(string_value()?),
            "download_dir" => cfg.download_dir = Some(PathBuf::from(string_value()?)),
            "connect_timeout_secs" => cfg.connect_timeout_secs = Some(integer_value()?),
            "read_timeout_secs" => cfg.read_timeout_secs = Some(integer_value()?),
            "wait_timeout_secs" => cfg.wait_timeout_secs = Some(integer_value()?),
            "max_poll_interval_secs" => cfg.max_poll_interval_secs = Some(integer_value()?),
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut quoted = false;
    let end = line
        .char_indices()
        .find_map(|(index, ch)| {
            if ch == '"' {
                quoted = !quoted;
            }
            (ch == '#' && !quoted).then_some(index)
        })
        .unwrap_or(line.len());
    &line[..end]
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    raw_value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::to_string)
        .context("Expected double-quoted string")
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.starts_with('-') {
        bail!("Expected non-negative integer");
    }
    token
        .parse::<u64>()
        .with_context(|| format!("Expected integer value, got `{token}`"))
}

/// Settings given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Builds the client configuration from flags, environment and file.
///
/// `lookup_env` is `std::env::var(..).ok()` outside tests.
pub fn resolve_client_config(
    overrides: &Overrides,
    loaded: &LoadedConfig,
    lookup_env: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig> {
    let file = loaded.config.clone().unwrap_or_default();
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    let Some(api_key) = non_empty(overrides.api_key.clone())
        .or_else(|| non_empty(lookup_env(API_KEY_ENV)))
        .or_else(|| non_empty(file.api_key.clone()))
    else {
        let location = loaded.path.as_deref().map_or_else(
            || "the config file".to_string(),
            |path| format!("'{}'", path.display()),
        );
        bail!("No API key: pass --api-key, set {API_KEY_ENV}, or add `api_key` to {location}");
    };

    let mut config = ClientConfig::new(api_key);
    if let Some(base_url) = non_empty(overrides.base_url.clone())
        .or_else(|| non_empty(lookup_env(BASE_URL_ENV)))
        .or(file.base_url)
    {
        config = config.with_base_url(base_url);
    }
    if let Some(api_version) = file.api_version {
        config = config.with_api_version(api_version);
    }
    config = config.with_timeouts(
        Duration::from_secs(file.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS)),
        Duration::from_secs(file.read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS)),
    );

    let mut wait_policy = WaitPolicy::default();
    if let Some(secs) = file.wait_timeout_secs {
        wait_policy = wait_policy.with_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = file.max_poll_interval_secs {
        let max_interval = Duration::from_secs(secs).max(INITIAL_POLL_INTERVAL);
        wait_policy = wait_policy.with_max_interval(max_interval);
    }
    Ok(config.with_wait_policy(wait_policy))
}
