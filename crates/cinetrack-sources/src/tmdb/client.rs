use async_trait::async_trait;
use chrono::Utc;
use cinetrack_config::TmdbConfig;
use cinetrack_models::{Credits, MovieCollection, MovieDetail, MoviePage, Video};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use crate::error::SourceError;
use crate::tmdb::api::{self, TmdbMovieDetail, TmdbVideos};
use crate::traits::{MetadataProvider, MovieFeed, TrendingWindow};

#[derive(Clone)]
pub struct TmdbClient {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
    language: String,
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("cinetrack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            language: config.language.clone(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, SourceError> {
        api::get_json(&self.client, &self.base_url, path, &self.api_key, &self.language, query).await
    }

    async fn get_page(&self, path: &str, page: u32) -> Result<MoviePage, SourceError> {
        self.get(path, &[("page", page.max(1).to_string())]).await
    }
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    fn provider_name(&self) -> &str {
        "tmdb"
    }

    async fn movie_detail(&self, movie_id: u64) -> Result<MovieDetail, SourceError> {
        let raw: TmdbMovieDetail = self.get(&format!("movie/{}", movie_id), &[]).await?;
        api::to_movie_detail(raw, movie_id, Utc::now())
    }

    async fn movie_list(&self, feed: MovieFeed, page: u32) -> Result<MoviePage, SourceError> {
        self.get_page(feed.path(), page).await
    }

    async fn trending(&self, window: TrendingWindow, page: u32) -> Result<MoviePage, SourceError> {
        self.get_page(window.path(), page).await
    }

    async fn recommendations(&self, movie_id: u64, page: u32) -> Result<MoviePage, SourceError> {
        self.get_page(&format!("movie/{}/recommendations", movie_id), page).await
    }

    async fn similar(&self, movie_id: u64, page: u32) -> Result<MoviePage, SourceError> {
        self.get_page(&format!("movie/{}/similar", movie_id), page).await
    }

    async fn search(&self, query: &str, page: u32) -> Result<MoviePage, SourceError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SourceError::InvalidInput("search query is empty".to_string()));
        }
        self.get(
            "search/movie",
            &[("query", query.to_string()), ("page", page.max(1).to_string())],
        )
        .await
    }

    async fn credits(&self, movie_id: u64) -> Result<Credits, SourceError> {
        self.get(&format!("movie/{}/credits", movie_id), &[]).await
    }

    async fn videos(&self, movie_id: u64) -> Result<Vec<Video>, SourceError> {
        let videos: TmdbVideos = self.get(&format!("movie/{}/videos", movie_id), &[]).await?;
        Ok(videos.results)
    }

    async fn collection(&self, collection_id: u64) -> Result<MovieCollection, SourceError> {
        self.get(&format!("collection/{}", collection_id), &[]).await
    }
}
