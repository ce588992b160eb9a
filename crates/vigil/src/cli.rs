//! Clap derive structures for the `vigil` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vigil -- watch an alarm panel and report its state
#[derive(Debug, Parser)]
#[command(
    name = "vigil",
    version,
    about = "Watch an alarm panel from the command line",
    long_about = "Polls an alarm-panel service on a fixed interval and reports\n\
        each cycle as ready or unavailable, with a distinct signal when\n\
        the session needs to be re-authenticated.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Panel profile to use
    #[arg(long, short = 'p', env = "VIGIL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Panel service URL (overrides profile)
    #[arg(long, short = 'u', env = "VIGIL_PANEL", global = true)]
    pub panel: Option<String>,

    /// Account username (overrides profile)
    #[arg(long, env = "VIGIL_USERNAME", global = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "VIGIL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "VIGIL_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "VIGIL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines and tables (default)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON, one object per cycle
    JsonCompact,
    /// Tab-separated values (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the panel continuously and print every cycle
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Connect, run a single cycle, and report the result
    Check,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Time between the end of one poll and the start of the next
    /// (e.g. "30s", "2m"; overrides profile)
    #[arg(long, short = 'i', value_parser = parse_interval)]
    pub interval: Option<Duration>,

    /// Consecutive failures tolerated before reporting unavailable
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub unavailable_after: Option<u32>,

    /// Stop after this many cycles
    #[arg(long, short = 'n')]
    pub cycles: Option<u64>,

    /// Exit with the authentication exit code instead of logging in again
    #[arg(long)]
    pub exit_on_reauth: bool,
}

fn parse_interval(raw: &str) -> Result<Duration, String> {
    let interval = raw
        .parse::<u64>()
        .map(Duration::from_secs)
        .or_else(|_| humantime::parse_duration(raw))
        .map_err(|e| format!("invalid duration '{raw}': {e}"))?;

    if interval.is_zero() {
        return Err("interval must be greater than zero".into());
    }
    Ok(interval)
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display the resolved configuration (secrets redacted)
    Show,

    /// Write a starter profile from --panel and --username
    Init {
        /// Environment variable holding the password
        #[arg(long)]
        password_env: Option<String>,

        /// Overwrite an existing profile of the same name
        #[arg(long)]
        force: bool,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a password in the system keyring (read from stdin)
    SetPassword,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
