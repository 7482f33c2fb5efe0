use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

const SESSION_TOKEN_KEY: &str = "session_token";
const SESSION_USERNAME_KEY: &str = "session_username";

#[derive(Debug, Serialize, Deserialize, Default)]
struct CredentialsData {
    #[serde(flatten)]
    data: HashMap<String, String>,
}

pub struct CredentialStore {
    path: PathBuf,
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            credentials: HashMap::new(),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            let creds_data: CredentialsData = toml::from_str(&content)?;
            self.credentials = creds_data.data;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let creds_data = CredentialsData {
            data: self.credentials.clone(),
        };
        let content = toml::to_string_pretty(&creds_data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.credentials.get(key)
    }

    pub fn set(&mut self, key: String, value: String) {
        self.credentials.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.credentials.remove(key);
    }

    // Backend session
    pub fn get_session_token(&self) -> Option<&String> {
        self.get(SESSION_TOKEN_KEY)
    }

    pub fn set_session_token(&mut self, token: String) {
        self.set(SESSION_TOKEN_KEY.to_string(), token);
    }

    pub fn get_session_username(&self) -> Option<&String> {
        self.get(SESSION_USERNAME_KEY)
    }

    pub fn set_session_username(&mut self, username: String) {
        self.set(SESSION_USERNAME_KEY.to_string(), username);
    }

    /// Drop the session token and associated identity
    pub fn clear_session(&mut self) {
        self.remove(SESSION_TOKEN_KEY);
        self.remove(SESSION_USERNAME_KEY);
    }
}
