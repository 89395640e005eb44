//! Share expiry daemon.
//!
//! Restores the registry from ReDB and periodically reports guardian shares
//! that are close to, or past, their expiry date.

use std::sync::Arc;

use anyhow::{Context, Result};
use guardian_recovery::config::Settings;
use guardian_recovery::recovery::{ExpiryMonitor, GuardianRegistry, SystemClock};
use guardian_recovery::storage::Storage;
use guardian_recovery::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env();
    telemetry::init_tracing_with(settings.log_format());

    if let Err(e) = settings.validate() {
        anyhow::bail!("Configuration error: {e}");
    }

    let storage = Storage::open(settings.db_path())
        .with_context(|| format!("Failed to open {}", settings.db_path().display()))?;
    let registry = Arc::new(
        GuardianRegistry::with_store(Arc::new(storage), Arc::new(SystemClock))
            .context("Failed to restore recovery state")?,
    );
    let monitor = Arc::new(ExpiryMonitor::new());

    tracing::info!(
        db_path = %settings.db_path().display(),
        interval_secs = settings.expiry_check_interval().as_secs(),
        "Starting expiry monitor"
    );

    let mut interval = tokio::time::interval(settings.expiry_check_interval());

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let registry = Arc::clone(&registry);
                let monitor = Arc::clone(&monitor);
                let report = tokio::task::spawn_blocking(move || monitor.check_expiry(&registry))
                    .await
                    .context("Expiry check task failed")?;

                match report {
                    Ok(report) if report.has_expired_shares => {
                        tracing::error!(
                            notifications = report.notifications.len(),
                            "Expired guardian shares present, regenerate shares"
                        );
                    }
                    Ok(report) => {
                        tracing::info!(
                            notifications = report.notifications.len(),
                            "Expiry check complete"
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, code = ?e.error_code(), "Expiry check failed");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down expiry monitor");
                break;
            }
        }
    }

    telemetry::shutdown_tracing();
    Ok(())
}
