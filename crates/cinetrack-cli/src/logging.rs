use anyhow::{anyhow, Result};
use std::io::{self, IsTerminal};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, time::ChronoUtc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Log to stderr
pub fn init_logging(verbose_level: u8, quiet: bool) -> Result<()> {
    init(verbose_level, quiet, None)
}

/// Log to a daily-rotating file next to `log_file` (the daemon's sink)
pub fn init_file_logging(verbose_level: u8, quiet: bool, log_file: &Path) -> Result<()> {
    init(verbose_level, quiet, Some(log_file))
}

fn filter_for(verbose_level: u8, quiet: bool) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }
    // 0 = info, 1 = debug without hyper connection chatter, 2+ = everything
    let default = match verbose_level {
        0 => "info",
        1 => "debug,hyper::proto::h1=warn,hyper::client::pool=warn,reqwest::connect=warn",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn init(verbose_level: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let json = std::env::var("RUST_LOG_JSON")
        .map(|v| v == "true")
        .unwrap_or_else(|_| !io::stdout().is_terminal());

    let registry = Registry::default().with(filter_for(verbose_level, quiet));

    let Some(log_path) = log_file else {
        if json {
            registry
                .with(fmt::layer().json().with_timer(ChronoUtc::rfc_3339()).with_writer(io::stderr))
                .init();
        } else {
            registry
                .with(fmt::layer().with_timer(ChronoUtc::rfc_3339()).with_writer(io::stderr))
                .init();
        }
        return Ok(());
    };

    let log_dir = log_path
        .parent()
        .ok_or_else(|| anyhow!("Log file path has no parent directory"))?;
    std::fs::create_dir_all(log_dir)?;

    // cinetrack.log rotates to cinetrack.2026-01-17 and so on
    let file_name = log_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid log filename"))?;
    let prefix = file_name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file_name);
    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, prefix);

    if json {
        registry
            .with(fmt::layer().json().with_timer(ChronoUtc::rfc_3339()).with_writer(appender))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(appender),
            )
            .init();
    }
    Ok(())
}
