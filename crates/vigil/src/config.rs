//! CLI configuration: thin wrapper around `vigil_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--panel, --username, --insecure, --timeout) and `watch` overrides.

use std::time::Duration;

use vigil_config::{Config, Defaults, Profile};
use vigil_core::{CoordinatorConfig, PanelConfig, TlsVerification};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;

/// A resolved panel target: the profile it came from (if any) plus the
/// connection settings with flag overrides applied.
pub struct Target {
    pub profile_name: String,
    pub profile: Option<Profile>,
    pub panel: PanelConfig,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Build the panel connection settings from config, profile and flags.
///
/// With a matching profile, flags override profile values. Without one,
/// `--panel` and a username are required and the password comes from
/// `VIGIL_PASSWORD` or the keyring.
pub fn resolve_target(global: &GlobalOpts, config: &Config) -> Result<Target, CliError> {
    let profile_name = active_profile_name(global, config);

    let (profile, from_config) = match config.profiles.get(&profile_name) {
        Some(profile) => (profile.clone(), true),
        None => {
            if global.profile.is_some() && global.panel.is_none() {
                // An explicitly requested profile must exist.
                config.profile(&profile_name)?;
            }
            let panel = global.panel.clone().ok_or_else(|| CliError::NoConfig {
                path: vigil_config::config_path().display().to_string(),
            })?;
            let profile = Profile {
                panel,
                ..Profile::default()
            };
            (profile, false)
        }
    };

    let panel = resolve_panel(&profile, &profile_name, global, &config.defaults)?;
    Ok(Target {
        profile_name,
        profile: from_config.then_some(profile),
        panel,
    })
}

/// Translate a `Profile` + global flags into a `PanelConfig`.
///
/// CLI flag overrides take priority over profile values.
fn resolve_panel(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
    defaults: &Defaults,
) -> Result<PanelConfig, CliError> {
    // 1. Panel URL (flag > env > profile)
    let url = vigil_config::parse_panel_url(global.panel.as_deref().unwrap_or(&profile.panel))?;

    // 2. Credentials
    let username = match global.username {
        Some(ref username) => username.clone(),
        None => vigil_config::resolve_username(profile, profile_name)?,
    };
    let password = vigil_config::resolve_password(profile, profile_name)?;

    // 3. TLS verification
    let tls = if global.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        vigil_config::profile_tls(profile, defaults)
    };

    // 4. Timeout (flag > profile > defaults)
    let timeout = Duration::from_secs(
        global
            .timeout
            .or(profile.timeout)
            .unwrap_or(defaults.timeout),
    );

    Ok(PanelConfig {
        url,
        username,
        password,
        tls,
        timeout,
    })
}

/// Coordinator settings for a target, with `watch` flag overrides.
pub fn resolve_coordinator(
    target: &Target,
    defaults: &Defaults,
    watch: Option<&WatchArgs>,
) -> Result<CoordinatorConfig, CliError> {
    let base = target.profile.clone().unwrap_or_default();
    let mut config = vigil_config::profile_to_coordinator_config(&base, defaults)?;

    if let Some(args) = watch {
        if let Some(interval) = args.interval {
            config.poll_interval = interval;
        }
        if let Some(threshold) = args.unavailable_after {
            config.unavailable_after = threshold;
        }
    }

    config.validate()?;
    Ok(config)
}
