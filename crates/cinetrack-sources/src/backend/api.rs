use cinetrack_models::PrivacySetting;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::SourceError;

/// Row of `GET /likes/all`: how many users liked a movie
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeCount {
    pub movie_id: u64,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct MovieBody {
    pub movie_id: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct RatingBody {
    pub movie_id: u64,
    pub rating: u8,
}

#[derive(Debug, Serialize)]
pub(crate) struct AvatarBody<'a> {
    pub avatar: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct UsernameBody<'a> {
    pub username: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct PasswordBody<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct PrivacyBody {
    pub privacy: PrivacySetting,
}

#[derive(Debug, Serialize)]
pub(crate) struct FriendRequestBody<'a> {
    pub username: &'a str,
}

/// Some deployments wrap list payloads as `{"items": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListPayload<T> {
    Bare(Vec<T>),
    Wrapped { items: Vec<T> },
}

impl<T> ListPayload<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ListPayload::Bare(items) => items,
            ListPayload::Wrapped { items } => items,
        }
    }
}

/// Send a request and map auth and status failures
pub(crate) async fn send(request: RequestBuilder, endpoint: &str) -> Result<Response, SourceError> {
    let response = request.send().await?;
    let status = response.status();
    debug!(operation = "backend_request", endpoint = endpoint, status = status.as_u16(), "Backend responded");

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(SourceError::Unauthorized(format!("{} returned {}", endpoint, status.as_u16())));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder, endpoint: &str) -> Result<T, SourceError> {
    let response = send(request, endpoint).await?;
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| SourceError::decode(endpoint, e))
}
