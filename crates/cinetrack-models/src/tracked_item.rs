use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::movie::MovieDetail;

/// The three per-user lists a movie can belong to.
///
/// A movie may independently sit in all three, but only once per list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Watchlist,
    Watched,
    Liked,
}

impl ListKind {
    pub const ALL: [ListKind; 3] = [ListKind::Watchlist, ListKind::Watched, ListKind::Liked];

    /// Name of the local collection holding this list
    pub fn collection_name(&self) -> &'static str {
        match self {
            ListKind::Watchlist => "watchlist",
            ListKind::Watched => "watched",
            ListKind::Liked => "likes",
        }
    }

    /// Path segment of the backend endpoint serving this list
    pub fn endpoint(&self) -> &'static str {
        match self {
            ListKind::Watchlist => "watchlist",
            ListKind::Watched => "watched",
            ListKind::Liked => "likes",
        }
    }

    /// Whether rows of this kind count towards the recommendation seen set
    pub fn counts_as_seen(&self) -> bool {
        matches!(self, ListKind::Watchlist | ListKind::Watched)
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListKind::Watchlist => "watchlist",
            ListKind::Watched => "watched",
            ListKind::Liked => "liked",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ListKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "watchlist" => Ok(ListKind::Watchlist),
            "watched" => Ok(ListKind::Watched),
            "liked" | "likes" => Ok(ListKind::Liked),
            other => Err(format!("Unknown list '{}'. Use watchlist, watched or liked", other)),
        }
    }
}

/// Ratings are whole numbers from 1 to 10
pub fn is_valid_rating(rating: u8) -> bool {
    (1..=10).contains(&rating)
}

/// A row as returned by the backend list endpoints (`GET /watchlist`, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListEntry {
    pub movie_id: u64,
    #[serde(alias = "created_at")]
    pub added_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
}

/// A user's association with a movie in one list, as mirrored locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedItem {
    pub movie_id: u64,
    pub list_kind: ListKind,
    pub added_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_detail: Option<MovieDetail>,
}

impl TrackedItem {
    pub fn new(movie_id: u64, list_kind: ListKind, added_at: DateTime<Utc>) -> Self {
        Self {
            movie_id,
            list_kind,
            added_at,
            rating: None,
            cached_detail: None,
        }
    }

    /// Build a bare (un-enriched) item from a backend row.
    /// Out-of-range ratings from the backend are dropped rather than stored.
    pub fn from_entry(entry: &ListEntry, list_kind: ListKind) -> Self {
        Self {
            movie_id: entry.movie_id,
            list_kind,
            added_at: entry.added_at,
            rating: entry.rating.filter(|r| is_valid_rating(*r)),
            cached_detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Option<MovieDetail>) -> Self {
        self.cached_detail = detail;
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.cached_detail.as_ref().map(|d| d.title.as_str())
    }
}
