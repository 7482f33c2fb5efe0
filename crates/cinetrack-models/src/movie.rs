use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Genre {
    pub id: u32,
    pub name: String,
}

/// Snapshot of provider metadata for one movie.
///
/// Never patched in place: a stale snapshot is replaced wholesale by a fresh one.
/// `cached_at` is stored as epoch milliseconds so the cache index orders numerically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieDetail {
    pub movie_id: u64,
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub genres: BTreeSet<Genre>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub cached_at: DateTime<Utc>,
}

impl MovieDetail {
    /// Release year parsed from `release_date` (`YYYY-MM-DD`)
    pub fn year(&self) -> Option<u32> {
        self.release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok())
    }
}

/// A row from a paginated provider listing (popular, trending, search, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieSummary {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoviePage {
    pub page: u32,
    pub total_pages: u32,
    #[serde(default)]
    pub results: Vec<MovieSummary>,
}

impl MoviePage {
    pub fn empty(page: u32) -> Self {
        Self {
            page,
            total_pages: 0,
            results: Vec::new(),
        }
    }

    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}
