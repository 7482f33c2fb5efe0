use async_trait::async_trait;
use cinetrack_models::{Credits, ListEntry, ListKind, MovieCollection, MovieDetail, MoviePage, UserProfile, Video};
use crate::error::SourceError;

/// Fixed provider listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovieFeed {
    Popular,
    TopRated,
    Upcoming,
}

impl MovieFeed {
    pub fn path(&self) -> &'static str {
        match self {
            MovieFeed::Popular => "movie/popular",
            MovieFeed::TopRated => "movie/top_rated",
            MovieFeed::Upcoming => "movie/upcoming",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrendingWindow {
    Day,
    Week,
}

impl TrendingWindow {
    pub fn path(&self) -> &'static str {
        match self {
            TrendingWindow::Day => "trending/movie/day",
            TrendingWindow::Week => "trending/movie/week",
        }
    }
}

/// Read-only movie metadata (TMDB)
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn movie_detail(&self, movie_id: u64) -> Result<MovieDetail, SourceError>;
    async fn movie_list(&self, feed: MovieFeed, page: u32) -> Result<MoviePage, SourceError>;
    async fn trending(&self, window: TrendingWindow, page: u32) -> Result<MoviePage, SourceError>;
    async fn recommendations(&self, movie_id: u64, page: u32) -> Result<MoviePage, SourceError>;
    async fn similar(&self, movie_id: u64, page: u32) -> Result<MoviePage, SourceError>;

    // Lookups the sync and feed paths never need; providers may leave them out
    async fn search(&self, _query: &str, _page: u32) -> Result<MoviePage, SourceError> {
        Err(SourceError::Unsupported("search"))
    }

    async fn credits(&self, _movie_id: u64) -> Result<Credits, SourceError> {
        Err(SourceError::Unsupported("credits"))
    }

    async fn videos(&self, _movie_id: u64) -> Result<Vec<Video>, SourceError> {
        Err(SourceError::Unsupported("videos"))
    }

    async fn collection(&self, _collection_id: u64) -> Result<MovieCollection, SourceError> {
        Err(SourceError::Unsupported("collection"))
    }
}

/// Authenticated per-user state. The backend is the source of truth.
#[async_trait]
pub trait TrackerBackend: Send + Sync {
    fn backend_name(&self) -> &str;

    // Session
    fn is_authenticated(&self) -> bool;
    /// Forget the session token (in memory and wherever it is persisted)
    fn clear_session(&self);

    /// Cheap reachability probe used for online/offline detection
    async fn ping(&self) -> bool;

    // Data retrieval
    async fn get_profile(&self) -> Result<UserProfile, SourceError>;
    async fn get_list(&self, kind: ListKind) -> Result<Vec<ListEntry>, SourceError>;

    // Data modification
    async fn add_to_list(&self, kind: ListKind, movie_id: u64) -> Result<(), SourceError>;
    async fn remove_from_list(&self, kind: ListKind, movie_id: u64) -> Result<(), SourceError>;
    async fn rate_movie(&self, movie_id: u64, rating: u8) -> Result<(), SourceError>;
}
