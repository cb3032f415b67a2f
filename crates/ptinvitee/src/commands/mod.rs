//! Command dispatch: bridges CLI args -> core engine -> output formatting.

pub mod config_cmd;
pub mod refresh;
pub mod show;
pub mod sites;
pub mod status;
pub mod watch;

use ptinvitee_config::Config;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command that needs the loaded config.
pub async fn dispatch(cmd: Command, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Refresh(args) => refresh::handle(args, cfg, global).await,
        Command::Show(args) => show::handle(args, cfg, global).await,
        Command::Status => status::handle(cfg, global).await,
        Command::Watch(args) => watch::handle(args, cfg, global).await,
        Command::Sites(args) => sites::handle(args, cfg, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
