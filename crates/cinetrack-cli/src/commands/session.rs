use crate::output::Output;
use cinetrack_config::{CredentialStore, PathManager};
use cinetrack_sources::{BackendClient, TrackerBackend};
use color_eyre::eyre::eyre;
use color_eyre::Result;

pub async fn run_login(token: Option<String>, output: &Output) -> Result<()> {
    let paths = PathManager::default();
    paths
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create data directories: {}", e))?;
    let config = super::load_config(&paths)?;

    let token = match token {
        Some(token) => token,
        None => rpassword::prompt_password("Session token: ")
            .map_err(|e| eyre!("Failed to read session token: {}", e))?,
    };
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(eyre!("Session token cannot be empty"));
    }

    // Verify against a client that is not wired to the credentials file, so a bad
    // token never clears the one already stored
    let backend = BackendClient::new(&config.backend, Some(token.clone()))
        .map_err(|e| eyre!("Failed to create backend client: {}", e))?;
    let profile = backend.get_profile().await.map_err(|e| {
        if e.is_auth() {
            eyre!("The backend rejected this token")
        } else {
            eyre!("Failed to verify token: {}", e)
        }
    })?;

    let mut store = CredentialStore::new(paths.credentials_file());
    store.load().map_err(|e| eyre!("Failed to load credentials: {}", e))?;
    store.set_session_token(token);
    store.set_session_username(profile.username.clone());
    store.save().map_err(|e| eyre!("Failed to save credentials: {}", e))?;

    tracing::info!(operation = "login", username = %profile.username, "Session stored");
    output.data(&profile, || {
        output.success(format!("Signed in as {}", profile.username));
    });
    Ok(())
}

pub async fn run_logout(output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let credentials_file = paths.credentials_file();
    if !credentials_file.exists() {
        output.info("Not signed in");
        return Ok(());
    }

    let mut store = CredentialStore::new(credentials_file);
    store.load().map_err(|e| eyre!("Failed to load credentials: {}", e))?;
    let username = store.get_session_username().cloned();
    store.clear_session();
    store.save().map_err(|e| eyre!("Failed to save credentials: {}", e))?;

    match username {
        Some(name) => output.success(format!("Signed out {}", name)),
        None => output.success("Signed out"),
    }
    Ok(())
}
