use crate::commands::AppContext;
use crate::logging;
use crate::output::Output;
use async_trait::async_trait;
use cinetrack_core::{SchedulerOptions, SyncJob, SyncScheduler, SyncStatus, SyncTrigger};
use cinetrack_sources::TrackerBackend;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Engine sync that reports through the daemon's log instead of the terminal
struct DaemonJob {
    ctx: Arc<AppContext>,
}

#[async_trait]
impl SyncJob for DaemonJob {
    fn ready(&self) -> bool {
        self.ctx.backend.is_authenticated()
    }

    async fn run(&self, trigger: SyncTrigger) -> anyhow::Result<()> {
        let report = self.ctx.engine.sync_all().await?;
        if report.status == SyncStatus::SessionExpired {
            warn!(operation = "daemon_session_expired", "Session expired; run 'cinetrack login' to resume syncing");
        }
        info!(
            operation = "scheduled_sync_complete",
            trigger = ?trigger,
            status = ?report.status,
            duration_ms = report.duration_ms,
            "Scheduled sync finished"
        );
        Ok(())
    }
}

pub async fn run_daemon(no_startup_sync: bool, verbose: u8, quiet: bool, output: &Output) -> Result<()> {
    let ctx = Arc::new(AppContext::load()?);

    let log_file = ctx.paths.daemon_log_file();
    logging::init_file_logging(verbose, quiet, &log_file).map_err(|e| eyre!("Failed to set up logging: {}", e))?;
    output.info(format!("Daemon started; logging to {}", log_file.display()));

    let mut options = SchedulerOptions::from(&ctx.config.scheduler);
    options.run_on_startup &= !no_startup_sync;
    let scheduler = Arc::new(SyncScheduler::new(Arc::new(DaemonJob { ctx: ctx.clone() }), options));

    info!(
        operation = "daemon_start",
        config_file = %ctx.paths.config_file().display(),
        store_dir = %ctx.paths.store_dir().display(),
        "Starting sync daemon"
    );

    // The startup sync only runs if the backend answers
    let online = ctx.backend.ping().await;
    if !online {
        warn!(operation = "connectivity", "Backend unreachable at startup, waiting for it to come back");
        scheduler.notify_offline();
    }

    scheduler.start().await.map_err(|e| eyre!("Failed to start scheduler: {}", e))?;

    let probe = tokio::spawn(probe_connectivity(
        ctx.backend.clone(),
        scheduler.clone(),
        Duration::from_secs(ctx.config.scheduler.probe_interval_secs.max(1)),
        online,
    ));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("Failed to listen for shutdown signal: {}", e))?;
    info!(operation = "daemon_shutdown", "Shutdown signal received");

    probe.abort();
    scheduler.stop().await.map_err(|e| eyre!("Failed to stop scheduler: {}", e))?;
    output.success("Daemon stopped");
    Ok(())
}

/// Poll the backend and report online/offline edges to the scheduler
async fn probe_connectivity(
    backend: Arc<dyn TrackerBackend>,
    scheduler: Arc<SyncScheduler>,
    every: Duration,
    mut online: bool,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let reachable = backend.ping().await;
        if reachable == online {
            continue;
        }
        online = reachable;
        if online {
            info!(operation = "connectivity", "Backend reachable again");
            scheduler.notify_online();
        } else {
            warn!(operation = "connectivity", "Backend unreachable");
            scheduler.notify_offline();
        }
    }
}
