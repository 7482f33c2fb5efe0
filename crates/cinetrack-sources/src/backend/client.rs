use async_trait::async_trait;
use cinetrack_config::{BackendConfig, CredentialStore};
use cinetrack_models::{
    is_valid_rating, Friend, FriendRequest, ListEntry, ListKind, PrivacySetting, UserProfile, UserSearchResult,
    UserStats,
};
use reqwest::{Client, RequestBuilder};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{info, warn};
use crate::backend::api::{self, LikeCount, ListPayload};
use crate::error::SourceError;
use crate::traits::TrackerBackend;

/// Bearer-token client for the per-user REST backend
#[derive(Clone)]
pub struct BackendClient {
    client: Arc<Client>,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
    /// Where the session token is persisted, so clearing it survives restarts
    credentials_file: Option<PathBuf>,
}

impl BackendClient {
    pub fn new(config: &BackendConfig, token: Option<String>) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("cinetrack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(token.filter(|t| !t.is_empty()))),
            credentials_file: None,
        })
    }

    /// Build a client whose session comes from (and is cleared in) the credentials file
    pub fn from_credentials(config: &BackendConfig, credentials_file: PathBuf) -> Result<Self, SourceError> {
        let mut store = CredentialStore::new(credentials_file.clone());
        if let Err(e) = store.load() {
            warn!("Failed to load credentials from {}: {}", credentials_file.display(), e);
        }
        let token = store.get_session_token().cloned();
        let mut client = Self::new(config, token)?;
        client.credentials_file = Some(credentials_file);
        Ok(client)
    }

    pub fn set_session(&self, token: String) {
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token);
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn bearer(&self) -> Result<String, SourceError> {
        self.token
            .read()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or_else(|| SourceError::Unauthorized("no session token".to_string()))
    }

    fn authed(&self, request: RequestBuilder) -> Result<RequestBuilder, SourceError> {
        Ok(request.bearer_auth(self.bearer()?))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let request = self.authed(self.client.get(self.url(path)))?;
        self.note_rejection(api::send_json(request, path).await)
    }

    async fn send_no_content(&self, request: RequestBuilder, path: &str) -> Result<(), SourceError> {
        let request = self.authed(request)?;
        self.note_rejection(api::send(request, path).await.map(|_| ()))
    }

    /// A 401/403 from the server ends the session, whoever made the call
    fn note_rejection<T>(&self, result: Result<T, SourceError>) -> Result<T, SourceError> {
        if matches!(&result, Err(e) if e.is_auth()) && self.is_authenticated() {
            warn!(operation = "session_rejected", "Backend rejected the session token");
            self.clear_session();
        }
        result
    }

    // Likes

    pub async fn all_likes(&self) -> Result<Vec<LikeCount>, SourceError> {
        let payload: ListPayload<LikeCount> = self.get_json("likes/all").await?;
        Ok(payload.into_vec())
    }

    // Profile

    pub async fn update_avatar(&self, avatar: &str) -> Result<(), SourceError> {
        let path = "profile/avatar";
        let request = self.client.put(self.url(path)).json(&api::AvatarBody { avatar });
        self.send_no_content(request, path).await
    }

    pub async fn update_username(&self, username: &str) -> Result<(), SourceError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(SourceError::InvalidInput("username cannot be empty".to_string()));
        }
        let path = "profile/username";
        let request = self.client.put(self.url(path)).json(&api::UsernameBody { username });
        self.send_no_content(request, path).await
    }

    pub async fn update_password(&self, current_password: &str, new_password: &str) -> Result<(), SourceError> {
        let path = "profile/password";
        let request = self.client.put(self.url(path)).json(&api::PasswordBody {
            current_password,
            new_password,
        });
        self.send_no_content(request, path).await
    }

    pub async fn update_privacy(&self, privacy: PrivacySetting) -> Result<(), SourceError> {
        let path = "profile/privacy";
        let request = self.client.put(self.url(path)).json(&api::PrivacyBody { privacy });
        self.send_no_content(request, path).await
    }

    pub async fn stats(&self) -> Result<UserStats, SourceError> {
        self.get_json("stats").await
    }

    // Friends

    pub async fn friends(&self) -> Result<Vec<Friend>, SourceError> {
        let payload: ListPayload<Friend> = self.get_json("friends").await?;
        Ok(payload.into_vec())
    }

    pub async fn friend_requests(&self) -> Result<Vec<FriendRequest>, SourceError> {
        let payload: ListPayload<FriendRequest> = self.get_json("friends/requests").await?;
        Ok(payload.into_vec())
    }

    pub async fn search_users(&self, query: &str) -> Result<Vec<UserSearchResult>, SourceError> {
        let path = "friends/search";
        let request = self.authed(self.client.get(self.url(path)).query(&[("q", query.trim())]))?;
        let payload: ListPayload<UserSearchResult> = self.note_rejection(api::send_json(request, path).await)?;
        Ok(payload.into_vec())
    }

    pub async fn send_friend_request(&self, username: &str) -> Result<(), SourceError> {
        let path = "friends/request";
        let request = self.client.post(self.url(path)).json(&api::FriendRequestBody { username });
        self.send_no_content(request, path).await
    }

    pub async fn accept_friend_request(&self, request_id: u64) -> Result<(), SourceError> {
        let path = format!("friends/accept/{}", request_id);
        let request = self.client.post(self.url(&path));
        self.send_no_content(request, &path).await
    }

    pub async fn remove_friend(&self, friend_id: u64) -> Result<(), SourceError> {
        let path = format!("friends/{}", friend_id);
        let request = self.client.delete(self.url(&path));
        self.send_no_content(request, &path).await
    }
}

#[async_trait]
impl TrackerBackend for BackendClient {
    fn backend_name(&self) -> &str {
        "backend"
    }

    fn is_authenticated(&self) -> bool {
        self.token.read().map(|guard| guard.is_some()).unwrap_or(false)
    }

    fn clear_session(&self) {
        if let Ok(mut guard) = self.token.write() {
            *guard = None;
        }

        if let Some(path) = &self.credentials_file {
            let mut store = CredentialStore::new(path.clone());
            let result = store.load().and_then(|_| {
                store.clear_session();
                store.save()
            });
            match result {
                Ok(()) => info!(operation = "session_cleared", "Cleared stored session token"),
                Err(e) => warn!("Failed to clear stored session token at {}: {}", path.display(), e),
            }
        }
    }

    async fn ping(&self) -> bool {
        // Any HTTP answer means the host is reachable
        self.client.head(&self.base_url).send().await.is_ok()
    }

    async fn get_profile(&self) -> Result<UserProfile, SourceError> {
        self.get_json("profile").await
    }

    async fn get_list(&self, kind: ListKind) -> Result<Vec<ListEntry>, SourceError> {
        let payload: ListPayload<ListEntry> = self.get_json(kind.endpoint()).await?;
        Ok(payload.into_vec())
    }

    async fn add_to_list(&self, kind: ListKind, movie_id: u64) -> Result<(), SourceError> {
        let path = kind.endpoint();
        let request = self.client.post(self.url(path)).json(&api::MovieBody { movie_id });
        self.send_no_content(request, path).await
    }

    async fn remove_from_list(&self, kind: ListKind, movie_id: u64) -> Result<(), SourceError> {
        let path = format!("{}/{}", kind.endpoint(), movie_id);
        let request = self.client.delete(self.url(&path));
        self.send_no_content(request, &path).await
    }

    async fn rate_movie(&self, movie_id: u64, rating: u8) -> Result<(), SourceError> {
        if !is_valid_rating(rating) {
            return Err(SourceError::InvalidInput(format!("rating must be 1-10, got {}", rating)));
        }
        let path = "ratings";
        let request = self.client.post(self.url(path)).json(&api::RatingBody { movie_id, rating });
        self.send_no_content(request, path).await
    }
}
