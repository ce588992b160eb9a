//! Config subcommand handlers.

use std::io::BufRead;

use vigil_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&vigil_config::config_path().display().to_string(), false);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(vigil_config::load_config()?);
            let rendered = match global.output {
                OutputFormat::Json => serde_json::to_string_pretty(&cfg)?,
                OutputFormat::JsonCompact => serde_json::to_string(&cfg)?,
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)?,
            };
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Init {
            password_env,
            force,
        } => init(global, password_env, force),

        ConfigCommand::Profiles => {
            let cfg = vigil_config::load_config()?;
            let active = config::active_profile_name(global, &cfg);
            let lines: Vec<String> = cfg
                .profile_names()
                .into_iter()
                .map(|name| {
                    let marker = if name == active { "*" } else { " " };
                    format!("{marker} {name}")
                })
                .collect();
            output::print_output(&lines.join("\n"), global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = vigil_config::load_config()?;
            cfg.profile(&name)?;
            cfg.default_profile = Some(name.clone());
            vigil_config::save_config(&cfg)?;
            eprintln!("default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = vigil_config::load_config_or_default();
            let name = config::active_profile_name(global, &cfg);

            let mut password = String::new();
            std::io::stdin().lock().read_line(&mut password)?;
            let password = password.trim_end_matches(['\r', '\n']);
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "expected the password on stdin".into(),
                });
            }

            vigil_config::store_password(&name, password)?;
            eprintln!("password for profile '{name}' stored in the system keyring");
            Ok(())
        }
    }
}

/// Write a starter profile built from `--panel`, `--username` and the
/// TLS/timeout flags.
fn init(global: &GlobalOpts, password_env: Option<String>, force: bool) -> Result<(), CliError> {
    let mut cfg = vigil_config::load_config_or_default();
    let name = config::active_profile_name(global, &cfg);

    if cfg.profiles.contains_key(&name) && !force {
        return Err(CliError::ProfileExists { name });
    }

    let panel = global.panel.clone().ok_or_else(|| CliError::Validation {
        field: "panel".into(),
        reason: "pass the panel URL with --panel".into(),
    })?;
    vigil_config::parse_panel_url(&panel)?;

    let username = global.username.clone().ok_or_else(|| CliError::Validation {
        field: "username".into(),
        reason: "pass the account name with --username".into(),
    })?;

    let profile = Profile {
        panel,
        username: Some(username),
        password_env,
        insecure: global.insecure.then_some(true),
        timeout: global.timeout,
        ..Profile::default()
    };

    if cfg.default_profile.is_none() || cfg.profiles.is_empty() {
        cfg.default_profile = Some(name.clone());
    }
    cfg.profiles.insert(name.clone(), profile);

    let path = vigil_config::save_config(&cfg)?;
    eprintln!("wrote profile '{name}' to {}", path.display());
    Ok(())
}

fn redacted(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(REDACTED.into());
        }
    }
    cfg
}
