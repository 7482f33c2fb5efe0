//! Sync triggers: startup, a fixed interval, and debounced reconnects.

use anyhow::{Context, Result};
use async_trait::async_trait;
use cinetrack_config::SchedulerConfig;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Startup,
    Interval,
    Reconnect,
    Manual,
}

/// Work the scheduler runs on each trigger
#[async_trait]
pub trait SyncJob: Send + Sync {
    /// Whether a run makes sense at all (e.g. a session exists)
    fn ready(&self) -> bool;
    async fn run(&self, trigger: SyncTrigger) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub interval: Duration,
    pub reconnect_debounce: Duration,
    pub run_on_startup: bool,
}

impl From<&SchedulerConfig> for SchedulerOptions {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_minutes.max(1) * 60),
            reconnect_debounce: Duration::from_secs(config.reconnect_debounce_secs),
            run_on_startup: config.run_on_startup,
        }
    }
}

struct Shared {
    job: Arc<dyn SyncJob>,
    online: AtomicBool,
}

impl Shared {
    async fn trigger(&self, trigger: SyncTrigger) -> bool {
        if !self.online.load(Ordering::SeqCst) {
            debug!(trigger = ?trigger, "Offline, skipping sync");
            return false;
        }
        if !self.job.ready() {
            debug!(trigger = ?trigger, "Not signed in, skipping sync");
            return false;
        }

        info!(operation = "scheduled_sync_start", trigger = ?trigger, "Starting sync");
        if let Err(e) = self.job.run(trigger).await {
            error!(operation = "scheduled_sync_error", trigger = ?trigger, error = %e, "Sync failed");
        }
        true
    }
}

pub struct SyncScheduler {
    shared: Arc<Shared>,
    options: SchedulerOptions,
    reconnect: Mutex<Option<JoinHandle<()>>>,
    jobs: tokio::sync::Mutex<Option<JobScheduler>>,
}

impl SyncScheduler {
    pub fn new(job: Arc<dyn SyncJob>, options: SchedulerOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                job,
                online: AtomicBool::new(true),
            }),
            options,
            reconnect: Mutex::new(None),
            jobs: tokio::sync::Mutex::new(None),
        }
    }

    pub fn is_online(&self) -> bool {
        self.shared.online.load(Ordering::SeqCst)
    }

    /// Register the interval job and run the startup sync if configured
    pub async fn start(&self) -> Result<()> {
        let mut jobs = self.jobs.lock().await;
        if jobs.is_some() {
            warn!("Scheduler already started");
            return Ok(());
        }

        let scheduler = JobScheduler::new().await.context("Failed to create job scheduler")?;
        let shared = self.shared.clone();
        let job = Job::new_repeated_async(self.options.interval, move |_uuid, _lock| {
            let shared = shared.clone();
            Box::pin(async move {
                shared.trigger(SyncTrigger::Interval).await;
            })
        })
        .context("Failed to create interval job")?;
        scheduler.add(job).await.context("Failed to register interval job")?;
        scheduler.start().await.context("Failed to start job scheduler")?;
        *jobs = Some(scheduler);
        drop(jobs);

        info!(
            operation = "scheduler_started",
            interval_secs = self.options.interval.as_secs(),
            run_on_startup = self.options.run_on_startup,
            "Sync scheduler started"
        );

        if self.options.run_on_startup {
            self.shared.trigger(SyncTrigger::Startup).await;
        }
        Ok(())
    }

    /// Cancel any pending reconnect and shut the interval job down
    pub async fn stop(&self) -> Result<()> {
        self.cancel_reconnect();
        if let Some(mut scheduler) = self.jobs.lock().await.take() {
            scheduler.shutdown().await.context("Failed to shut down job scheduler")?;
            info!(operation = "scheduler_stopped", "Sync scheduler stopped");
        }
        Ok(())
    }

    /// Connectivity came back. Syncs once the connection has been stable for
    /// the debounce window; each further call restarts the window.
    ///
    /// Only the wait is cancellable. Once the window elapses the sync runs on
    /// its own task and is never aborted by later connectivity events.
    pub fn notify_online(&self) {
        self.shared.online.store(true, Ordering::SeqCst);

        let shared = self.shared.clone();
        let debounce = self.options.reconnect_debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            tokio::spawn(async move {
                shared.trigger(SyncTrigger::Reconnect).await;
            });
        });

        if let Ok(mut pending) = self.reconnect.lock() {
            if let Some(previous) = pending.replace(handle) {
                previous.abort();
            }
        }
    }

    /// Connectivity lost: drop any pending reconnect and pause interval syncs.
    /// A sync already running is left to finish.
    pub fn notify_offline(&self) {
        self.shared.online.store(false, Ordering::SeqCst);
        self.cancel_reconnect();
        debug!("Marked offline");
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.reconnect
            .lock()
            .map(|pending| pending.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Run a trigger now. Returns whether a sync actually ran.
    pub async fn fire(&self, trigger: SyncTrigger) -> bool {
        self.shared.trigger(trigger).await
    }

    fn cancel_reconnect(&self) {
        if let Ok(mut pending) = self.reconnect.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }
}
