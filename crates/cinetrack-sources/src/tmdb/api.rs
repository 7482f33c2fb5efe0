use chrono::{DateTime, Utc};
use cinetrack_models::{Genre, MovieDetail, Video};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, trace};
use crate::error::SourceError;

/// Raw `/movie/{id}` payload. Everything is optional so one sparse record
/// surfaces as a decode error on that movie instead of a transport failure.
#[derive(Debug, Deserialize)]
pub(crate) struct TmdbMovieDetail {
    pub id: Option<u64>,
    pub title: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    pub vote_average: Option<f64>,
    pub runtime: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TmdbVideos {
    #[serde(default)]
    pub results: Vec<Video>,
}

/// Convert a raw detail payload into a cache snapshot stamped at `cached_at`
pub(crate) fn to_movie_detail(
    raw: TmdbMovieDetail,
    requested_id: u64,
    cached_at: DateTime<Utc>,
) -> Result<MovieDetail, SourceError> {
    let endpoint = format!("/movie/{}", requested_id);
    let movie_id = raw.id.unwrap_or(requested_id);
    if movie_id != requested_id {
        return Err(SourceError::decode(
            endpoint,
            format!("asked for movie {} but got {}", requested_id, movie_id),
        ));
    }
    let title = raw
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| SourceError::decode(&endpoint, "missing title"))?;

    Ok(MovieDetail {
        movie_id,
        title,
        poster_path: raw.poster_path.filter(|p| !p.is_empty()),
        // TMDB sends "" for unknown release dates
        release_date: raw.release_date.filter(|d| !d.is_empty()),
        genres: raw.genres.into_iter().collect(),
        vote_average: raw.vote_average.unwrap_or(0.0),
        runtime: raw.runtime.filter(|r| *r > 0),
        cached_at,
    })
}

/// GET `{base_url}/{path}` with the API key and language attached
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    base_url: &str,
    path: &str,
    api_key: &str,
    language: &str,
    extra_query: &[(&str, String)],
) -> Result<T, SourceError> {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), path);
    debug!(operation = "tmdb_request", path = path, "Requesting TMDB endpoint");

    let mut query: Vec<(&str, String)> = vec![
        ("api_key", api_key.to_string()),
        ("language", language.to_string()),
    ];
    query.extend(extra_query.iter().cloned());

    let response = client.get(&url).query(&query).send().await?;
    let response = check_status(response, path).await?;

    let body = response.text().await?;
    trace!(path = path, bytes = body.len(), "TMDB response received");
    serde_json::from_str(&body).map_err(|e| SourceError::decode(format!("/{}", path), e))
}

async fn check_status(response: Response, path: &str) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status.as_u16() == 401 {
        // Bad API key, not a user session problem
        return Err(SourceError::Status {
            endpoint: format!("/{}", path),
            status: status.as_u16(),
            body: "TMDB rejected the API key".to_string(),
        });
    }
    Err(SourceError::Status {
        endpoint: format!("/{}", path),
        status: status.as_u16(),
        body,
    })
}
