pub mod cache;
pub mod clear;
pub mod config;
pub mod daemon;
pub mod friends;
pub mod lists;
pub mod movie;
pub mod profile;
pub mod prompts;
pub mod recommend;
pub mod session;
pub mod sync;
pub mod sync_ui;

use cinetrack_config::{Config, PathManager};
use cinetrack_core::{LocalStore, StoreOptions, SyncConfig, SyncEngine, ViewState};
use cinetrack_sources::{BackendClient, TmdbClient};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use std::sync::Arc;

/// Everything a command needs, wired from config.toml and credentials.toml
pub struct AppContext {
    pub paths: PathManager,
    pub config: Config,
    pub backend: Arc<BackendClient>,
    pub provider: Arc<TmdbClient>,
    pub view: Arc<ViewState>,
    pub engine: Arc<SyncEngine>,
}

impl AppContext {
    pub fn load() -> Result<Self> {
        let paths = PathManager::default();
        paths
            .ensure_directories()
            .map_err(|e| eyre!("Failed to create data directories: {}", e))?;
        let config = load_config(&paths)?;

        let backend = Arc::new(
            BackendClient::from_credentials(&config.backend, paths.credentials_file())
                .wrap_err("Failed to create backend client")?,
        );
        let provider = Arc::new(TmdbClient::new(&config.tmdb).wrap_err("Failed to create TMDB client")?);
        let store = Arc::new(LocalStore::new(StoreOptions::from_config(paths.store_dir(), &config.cache)));
        let view = Arc::new(ViewState::new());

        let engine = Arc::new(
            SyncEngine::new(store, backend.clone(), SyncConfig::from(&config.cache))
                .with_provider(provider.clone())
                .with_view(view.clone()),
        );

        Ok(Self {
            paths,
            config,
            backend,
            provider,
            view,
            engine,
        })
    }
}

pub fn load_config(paths: &PathManager) -> Result<Config> {
    let config_file = paths.config_file();
    if !config_file.exists() {
        return Err(eyre!(
            "No configuration found at {}. Run 'cinetrack config init' and fill in the backend URL and TMDB API key.",
            config_file.display()
        ));
    }
    let config = Config::load_from_file(&config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
    config.validate().map_err(|e| eyre!("Invalid configuration: {}", e))?;
    Ok(config)
}

/// Turn an expired-session error into the message users should act on
pub fn describe_error(err: &anyhow::Error) -> String {
    if cinetrack_core::is_session_error(err) {
        "Your session has expired. Run 'cinetrack login' to sign in again.".to_string()
    } else {
        err.to_string()
    }
}
