//! Shared configuration for vigil.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `vigil_core::PanelConfig` / `CoordinatorConfig`.
//! The CLI adds `GlobalOpts`-aware overrides on top.

use std::collections::HashMap;
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

use vigil_core::{CoordinatorConfig, PanelConfig, TlsVerification};

/// Keyring service name for stored panel passwords.
pub const KEYRING_SERVICE: &str = "vigil";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String, available: Vec<String> },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

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
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named panel profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds between the end of one poll and the start of the next.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Consecutive non-auth failures before a ready panel is reported
    /// unavailable.
    #[serde(default = "default_unavailable_after")]
    pub unavailable_after: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            unavailable_after: default_unavailable_after(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    vigil_core::config::DEFAULT_POLL_INTERVAL.as_secs()
}
fn default_unavailable_after() -> u32 {
    vigil_core::config::DEFAULT_UNAVAILABLE_AFTER
}

/// A named panel profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Panel service base URL (e.g., "https://panel.example.com").
    pub panel: String,

    /// Account username.
    pub username: Option<String>,

    /// Password (plaintext; prefer keyring or env var).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable name containing the password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Path to custom CA certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    /// Override request timeout (seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Override poll interval (seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,

    /// Override the unavailability threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable_after: Option<u32>,
}

impl Config {
    /// Name of the profile to use: explicit choice, then `default_profile`,
    /// then `"default"`.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                name: name.into(),
                available: self.profile_names(),
            })
    }

    /// Profile names, sorted.
    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.keys().cloned().collect();
        names.sort();
        names
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "vigil", "vigil").map_or_else(
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
    p.push("vigil");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// A missing file yields the defaults. `VIGIL_`-prefixed variables use
/// `__` as the nesting separator (`VIGIL_DEFAULTS__TIMEOUT=10`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VIGIL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

/// Serialize config to TOML and write it to `path`, creating parent
/// directories as needed.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve the account username: profile, then `VIGIL_USERNAME`.
pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .or_else(|| std::env::var("VIGIL_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Resolve the password from the credential chain.
pub fn resolve_password(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    resolve_password_with(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        |name| keyring_entry(name).and_then(|entry| entry.get_password()).ok(),
    )
}

/// Credential chain over explicit environment and keyring lookups.
fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    stored: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(val) = profile.password_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(val));
    }

    // 2. Global env var
    if let Some(val) = env("VIGIL_PASSWORD") {
        return Ok(SecretString::from(val));
    }

    // 3. System keyring
    if let Some(secret) = stored(profile_name) {
        return Ok(SecretString::from(secret));
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
}

// ── Translation to core types ───────────────────────────────────────

/// Parse and check a panel URL.
pub fn parse_panel_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "panel".into(),
        reason: format!("invalid URL: {raw}"),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "panel".into(),
            reason: format!("unsupported scheme '{other}', expected http or https"),
        }),
    }
}

/// TLS strategy for a profile: `insecure` wins over `ca_cert`.
pub fn profile_tls(profile: &Profile, defaults: &Defaults) -> TlsVerification {
    if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    }
}

/// Build a `PanelConfig` from a profile, with no CLI flag overrides.
pub fn profile_to_panel_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<PanelConfig, ConfigError> {
    let password = resolve_password(profile, profile_name)?;
    panel_config(profile, profile_name, defaults, password)
}

fn panel_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    password: SecretString,
) -> Result<PanelConfig, ConfigError> {
    let url = parse_panel_url(&profile.panel)?;
    let username = resolve_username(profile, profile_name)?;

    Ok(PanelConfig {
        url,
        username,
        password,
        tls: profile_tls(profile, defaults),
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
    })
}

/// Build a validated `CoordinatorConfig` from a profile.
pub fn profile_to_coordinator_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<CoordinatorConfig, ConfigError> {
    let config = CoordinatorConfig {
        poll_interval: Duration::from_secs(profile.poll_interval.unwrap_or(defaults.poll_interval)),
        unavailable_after: profile
            .unavailable_after
            .unwrap_or(defaults.unavailable_after),
    };

    config.validate().map_err(|e| ConfigError::Validation {
        field: "coordinator".into(),
        reason: e.to_string(),
    })?;
    Ok(config)
}
