pub(crate) mod list_queues;
pub(crate) mod migrate;
pub(crate) mod planner;
pub(crate) mod rollback;

use anyhow::{Context, Result};
use qhop_client::RabbitClient;
use qhop_core::{MigrationResult, QueueType};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::Settings;

/// How a command ended, mapped onto the process exit code.
///
/// Usage errors exit with 2 from clap before any command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    /// At least one queue was not migrated because its plan was blocked.
    Blocked,
    /// At least one migration or rollback ended `failed`.
    Failed,
}

impl Outcome {
    pub(crate) const ERROR_CODE: u8 = 1;

    /// Failed wins over Blocked, which wins over Success.
    pub(crate) fn of(results: &[MigrationResult]) -> Self {
        if results.iter().any(|r| r.error.is_some()) {
            Outcome::Failed
        } else if results.iter().any(MigrationResult::is_blocked) {
            Outcome::Blocked
        } else {
            Outcome::Success
        }
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Blocked => ExitCode::from(3),
            Outcome::Failed => ExitCode::from(4),
        }
    }
}

pub(crate) fn connect(settings: &Settings) -> Result<Arc<RabbitClient>> {
    let client = RabbitClient::builder()
        .config(settings.broker.clone())
        .build()
        .context("cannot configure the broker client")?;
    Ok(Arc::new(client))
}

/// Cancels `token` on the first Ctrl-C; jobs already running finish their
/// current phase and end in a terminal state.
pub(crate) fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, letting in-flight queues reach a safe phase");
            token.cancel();
        }
    });
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Accepts only quorum or stream.
pub(crate) fn parse_target(s: &str) -> std::result::Result<QueueType, String> {
    s.parse::<QueueType>()
        .and_then(QueueType::ensure_target)
        .map_err(|e| e.to_string())
}

pub(crate) fn parse_queue_type(s: &str) -> std::result::Result<QueueType, String> {
    s.parse::<QueueType>().map_err(|e| e.to_string())
}
