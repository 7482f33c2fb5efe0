use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use cinetrack_config::{CacheConfig, Config, PathManager};
use cinetrack_core::{Collection, LocalStore, StoreOptions};
use cinetrack_models::CHECKPOINT_LAST_SYNC;
use std::fs;

pub async fn run_clear(all: bool, cache: bool, credentials: bool, timestamps: bool, output: &Output) -> Result<()> {
    let paths = PathManager::default();

    if all {
        clear_cache(&paths, output)?;
        clear_credentials(&paths, output)?;
        output.success("Local cache, credentials and timestamps cleared");
        return Ok(());
    }

    if !(cache || credentials || timestamps) {
        output.warn("No clear option specified. Use --cache, --credentials, --timestamps, or --all");
        output.info("Example: cinetrack clear --cache");
        return Ok(());
    }

    if timestamps && !cache {
        clear_timestamps(&paths, output).await?;
    }
    if cache {
        clear_cache(&paths, output)?;
    }
    if credentials {
        clear_credentials(&paths, output)?;
    }
    Ok(())
}

fn clear_cache(paths: &PathManager, output: &Output) -> Result<()> {
    let store_dir = paths.store_dir();
    if !store_dir.exists() {
        output.info("No local cache found to clear");
        return Ok(());
    }

    fs::remove_dir_all(&store_dir)
        .map_err(|e| eyre!("Failed to remove local cache at {}: {}", store_dir.display(), e))?;
    output.success(format!("Cleared local cache: {}", store_dir.display()));
    Ok(())
}

fn clear_credentials(paths: &PathManager, output: &Output) -> Result<()> {
    let credentials_file = paths.credentials_file();
    if !credentials_file.exists() {
        output.info("No credentials file found to clear");
        return Ok(());
    }

    fs::remove_file(&credentials_file)
        .map_err(|e| eyre!("Failed to remove credentials file at {}: {}", credentials_file.display(), e))?;
    output.success(format!("Cleared credentials: {}", credentials_file.display()));
    Ok(())
}

/// Drop the last-sync checkpoint from the store, leaving cached lists in place
async fn clear_timestamps(paths: &PathManager, output: &Output) -> Result<()> {
    let store_dir = paths.store_dir();
    if !store_dir.exists() {
        output.info("No local cache found, nothing to clear");
        return Ok(());
    }

    // Same schema version the app opens the store with
    let cache_config = Config::load_from_file(&paths.config_file())
        .map(|c| c.cache)
        .unwrap_or_else(|_| CacheConfig::default());
    let store = LocalStore::new(StoreOptions::from_config(store_dir, &cache_config));

    let removed = store
        .delete(Collection::Settings, CHECKPOINT_LAST_SYNC)
        .await
        .map_err(|e| eyre!("Failed to clear last sync time: {}", e))?;
    if removed {
        tracing::info!(operation = "clear_timestamps", "Removed last sync checkpoint");
        output.success("Cleared last sync timestamp");
    } else {
        output.info("No sync timestamp found to clear");
    }
    Ok(())
}
