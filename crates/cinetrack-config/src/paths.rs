use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Overrides every location with one directory
pub const HOME_ENV: &str = "CINETRACK_HOME";
/// Mount point used when running inside the container image
pub const CONTAINER_ENV: &str = "CINETRACK_BASE_PATH";
const CONTAINER_DEFAULT: &str = "/app";
const APP_DIR: &str = "cinetrack";

/// Where a `PathManager`'s locations came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSource {
    /// `$CINETRACK_HOME` or an explicit root
    Home,
    /// `$CINETRACK_BASE_PATH`, or `/app` when it exists
    Container,
    /// Per-user platform directories from `dirs`
    Platform,
}

/// On-disk locations: config and credentials in one place, the record store and logs in another.
///
/// Platform installs follow the OS split between config and data directories. A single root
/// (home override or container) keeps config at the top and data under `data/`.
#[derive(Debug, Clone)]
pub struct PathManager {
    config_dir: PathBuf,
    data_dir: PathBuf,
    source: PathSource,
}

impl PathManager {
    /// Everything below one directory
    pub fn with_base(root: impl Into<PathBuf>) -> Self {
        Self::rooted(root.into(), PathSource::Home)
    }

    fn rooted(root: PathBuf, source: PathSource) -> Self {
        Self {
            data_dir: root.join("data"),
            config_dir: root,
            source,
        }
    }

    fn platform() -> Result<Self> {
        let config_root = dirs::config_dir().context("No per-user config directory on this platform")?;
        let data_root = dirs::data_local_dir().unwrap_or_else(|| config_root.clone());
        Ok(Self {
            config_dir: config_root.join(APP_DIR),
            data_dir: data_root.join(APP_DIR),
            source: PathSource::Platform,
        })
    }

    /// Home override first, then a mounted container root, then the platform directories
    pub fn resolve() -> Result<Self> {
        Self::resolve_from(env::var_os(HOME_ENV).map(PathBuf::from), container_root())
    }

    fn resolve_from(home: Option<PathBuf>, container: PathBuf) -> Result<Self> {
        if let Some(home) = home.filter(|h| !h.as_os_str().is_empty()) {
            return Ok(Self::rooted(home, PathSource::Home));
        }
        if container.is_dir() {
            return Ok(Self::rooted(container, PathSource::Container));
        }
        Self::platform()
    }

    pub fn source(&self) -> PathSource {
        self.source
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.config_dir.join("credentials.toml")
    }

    /// One JSON file per collection
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Base name for the daemon's daily-rotated log
    pub fn daemon_log_file(&self) -> PathBuf {
        self.log_dir().join("cinetrack.log")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.config_dir.clone(), self.store_dir(), self.log_dir()] {
            std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

impl Default for PathManager {
    fn default() -> Self {
        Self::resolve().unwrap_or_else(|_| Self::rooted(container_root(), PathSource::Container))
    }
}

fn container_root() -> PathBuf {
    env::var_os(CONTAINER_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONTAINER_DEFAULT))
}
