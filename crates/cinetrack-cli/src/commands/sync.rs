use crate::commands::prompts::prompt_yes_no;
use crate::commands::sync_ui::{is_interactive, Spinner};
use crate::commands::{describe_error, AppContext};
use crate::output::{new_table, Output};
use cinetrack_core::{ListOutcome, SkipReason, StorageHealth, SyncReport, SyncStatus};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use owo_colors::OwoColorize;

pub async fn run_sync(output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;

    let spinner = Spinner::start("Syncing lists from the backend...", output.is_human());
    let result = ctx.engine.sync_all().await;
    spinner.finish();

    let report = result.map_err(|e| eyre!("Sync failed: {}", describe_error(&e)))?;

    output.data(&report, || print_report(&report, output));
    if report.status == SyncStatus::SessionExpired {
        return Err(eyre!("Your session has expired. Run 'cinetrack login' to sign in again."));
    }
    Ok(())
}

fn print_report(report: &SyncReport, output: &Output) {
    match &report.status {
        SyncStatus::Skipped { reason: SkipReason::CacheDisabled } => {
            output.warn("Local cache is disabled; nothing to sync. Enable it with 'cinetrack cache enable'.");
            return;
        }
        SyncStatus::Skipped { reason: SkipReason::NotAuthenticated } => {
            output.warn("Not signed in. Run 'cinetrack login' first.");
            return;
        }
        SyncStatus::SessionExpired => return,
        SyncStatus::Completed | SyncStatus::Partial => {}
    }

    let mut table = new_table(&["List", "Result"]);
    for list in &report.lists {
        let result = match &list.outcome {
            ListOutcome::Synced { count } => format!("{} movies", count),
            ListOutcome::Kept { error } => format!("kept cached copy ({})", error),
            ListOutcome::NotFetched => "not fetched".to_string(),
        };
        table.add_row(vec![list.kind.to_string(), result]);
    }
    output.table(&table);

    output.info(format!(
        "Details: {} fetched, {} reused from cache, {} unavailable",
        report.details.fetched, report.details.reused, report.details.failed
    ));
    for error in &report.errors {
        output.warn(error);
    }

    let summary = format!("Sync finished in {} ms", report.duration_ms);
    if report.status == SyncStatus::Completed {
        output.success(summary);
    } else {
        output.warn(format!("{} with errors", summary));
    }
}

pub async fn run_status(output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let health = ctx
        .engine
        .storage_health()
        .await
        .map_err(|e| eyre!("Failed to read local cache: {}", e))?;

    output.data(&health, || print_health(&health, output));
    Ok(())
}

fn print_health(health: &StorageHealth, output: &Output) {
    let state = if health.enabled {
        "enabled".green().to_string()
    } else {
        "disabled".yellow().to_string()
    };
    output.info(format!("Local cache: {} (schema v{})", state, health.schema_version));

    match &health.profile {
        Some(profile) => output.info(format!("Signed in as: {}", profile.username)),
        None => output.info("Signed in as: unknown (not synced yet)"),
    }
    match health.last_sync {
        Some(at) => output.info(format!("Last sync: {}", at.format("%Y-%m-%d %H:%M:%S UTC"))),
        None => output.info("Last sync: never"),
    }

    let mut table = new_table(&["Collection", "Records"]);
    for count in &health.collections {
        table.add_row(vec![count.collection.to_string(), count.records.to_string()]);
    }
    output.table(&table);

    output.info(format!("Disk usage: {:.1} KiB", health.estimated_bytes as f64 / 1024.0));
    if health.stale_details > 0 {
        output.warn(format!(
            "{} cached movie detail(s) are past their max age and will be refreshed on the next sync",
            health.stale_details
        ));
    }
}

pub async fn run_reset(yes: bool, output: &Output) -> Result<()> {
    if !yes {
        if !is_interactive() {
            return Err(eyre!("Refusing to reset without confirmation; pass --yes"));
        }
        if !prompt_yes_no("This deletes every locally cached list and movie. Continue?", false)? {
            output.info("Reset cancelled");
            return Ok(());
        }
    }

    let ctx = AppContext::load()?;
    let spinner = Spinner::start("Resetting local cache...", output.is_human());
    let result = ctx.engine.reset_database().await;
    spinner.finish();
    result.map_err(|e| eyre!("Reset failed: {}", e))?;

    output.success(format!("Local cache reset: {}", ctx.paths.store_dir().display()));
    Ok(())
}

