use teamhub_core::sync::SyncOutcome;

use crate::commands::common::{format_sync_report, open_session, SessionOptions};
use crate::error::CliError;

pub async fn run_sync(options: &SessionOptions) -> Result<(), CliError> {
    if !options.config.remote.is_configured() {
        return Err(CliError::SyncNotConfigured);
    }

    let session = open_session(options).await?;
    // Starting an online session already syncs once
    let outcome = match session.start.initial_sync {
        Some(outcome) => outcome,
        None => session.orchestrator.sync_now().await,
    };

    match outcome {
        SyncOutcome::Completed(report) => {
            for line in format_sync_report(&report) {
                println!("{line}");
            }
            Ok(())
        }
        SyncOutcome::Offline => Err(CliError::Offline),
        SyncOutcome::NotConfigured => Err(CliError::SyncNotConfigured),
        SyncOutcome::AlreadyRunning => {
            println!("Sync already in progress");
            Ok(())
        }
    }
}
