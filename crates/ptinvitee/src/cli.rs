//! Clap derive structures for the `ptinvitee` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ptinvitee -- invitee tracking across private trackers
#[derive(Debug, Parser)]
#[command(
    name = "ptinvitee",
    version,
    about = "Track invite quotas and invitee share ratios across private trackers",
    long_about = "Logs into each configured tracker with its cookie or API token,\n\
        reads the invite page and the invitee roster, and keeps the latest\n\
        snapshot per site on disk. Failed sites keep their previous data.",
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
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "PTINVITEE_CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Output format [default: config `defaults.output`, else table]
    #[arg(long, short = 'o', env = "PTINVITEE_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output [default: config `defaults.color`, else auto]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

impl GlobalOpts {
    pub fn format(&self) -> OutputFormat {
        self.output.unwrap_or(OutputFormat::Table)
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color.unwrap_or(ColorMode::Auto)
    }

    /// Fill unset output and color flags from the config file's `[defaults]`.
    /// Unknown values there are ignored.
    pub fn apply_defaults(&mut self, defaults: &ptinvitee_config::Defaults) {
        if self.output.is_none() {
            self.output = OutputFormat::from_str(&defaults.output, true).ok();
        }
        if self.color.is_none() {
            self.color = ColorMode::from_str(&defaults.color, true).ok();
        }
    }
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
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
    /// Fetch every enabled site now (or one named site)
    #[command(alias = "r")]
    Refresh(RefreshArgs),

    /// Show stored invite status and invitees
    #[command(alias = "s")]
    Show(ShowArgs),

    /// Summary of the last refresh run
    Status,

    /// Refresh periodically until interrupted
    Watch(WatchArgs),

    /// Manage configured sites
    Sites(SitesArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Refresh / Show / Watch ───────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Refresh only this site (runs even if the site is disabled)
    pub site: Option<String>,

    /// Skip sites refreshed within the cache TTL
    #[arg(long)]
    pub if_stale: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Site to show in detail; lists every stored site when omitted
    pub site: Option<String>,

    /// Only list invitees with a warning or danger share ratio
    #[arg(long)]
    pub low_ratio: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Refresh interval, e.g. "30m" or "6h" (defaults to engine.refresh_interval)
    #[arg(long, short = 'i')]
    pub interval: Option<String>,

    /// Run one refresh immediately before the first interval elapses
    #[arg(long)]
    pub now: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SITES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SitesArgs {
    #[command(subcommand)]
    pub command: SitesCommand,
}

#[derive(Debug, Subcommand)]
pub enum SitesCommand {
    /// List configured sites with the handler each one resolves to
    #[command(alias = "ls")]
    List,

    /// Delete the stored snapshot of a site
    Forget {
        /// Site name
        #[arg(required_unless_present = "all")]
        name: Option<String>,

        /// Delete every stored snapshot
        #[arg(long, conflicts_with = "name")]
        all: bool,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display the resolved configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// Store a site cookie in the system keyring
    SetCookie {
        /// Site name as configured
        site: String,

        /// Cookie header value; read from stdin when omitted
        #[arg(long)]
        cookie: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
