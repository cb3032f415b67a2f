//! Watch command: periodic refresh until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use ptinvitee_config::Config;
use ptinvitee_core::RefreshOutcome;

use crate::cli::{GlobalOpts, WatchArgs};
use crate::config;
use crate::error::CliError;

fn parse_interval(text: &str) -> Result<Duration, CliError> {
    let interval = humantime::parse_duration(text.trim()).map_err(|e| CliError::Validation {
        field: "interval".into(),
        reason: format!("'{text}': {e}"),
    })?;
    if interval.is_zero() {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(interval)
}

pub async fn handle(args: WatchArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let orchestrator = Arc::new(config::orchestrator(global, cfg)?);
    let interval = match args.interval.as_deref() {
        Some(text) => parse_interval(text)?,
        None => ptinvitee_config::engine_config(cfg)?.refresh_interval,
    };

    if args.now {
        if let RefreshOutcome::Completed(summary) = orchestrator.refresh_now().await {
            info!(
                succeeded = summary.success_count,
                failed = summary.failure_count,
                "initial refresh done"
            );
        }
    }

    if !global.quiet {
        eprintln!(
            "Refreshing every {}, press Ctrl-C to stop",
            humantime::format_duration(interval)
        );
    }

    let cancel = CancellationToken::new();
    let task = Arc::clone(&orchestrator).spawn_periodic(interval, cancel.clone());

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, stopping");
    cancel.cancel();
    let _ = task.await;
    Ok(())
}
