//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use cinetrack_models::{ListEntry, ListKind, MovieDetail, MoviePage, MovieSummary, PrivacySetting, UserProfile};
use cinetrack_sources::{MetadataProvider, MovieFeed, SourceError, TrackerBackend, TrendingWindow};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const PAGE_SIZE: usize = 20;

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn entry(movie_id: u64) -> ListEntry {
    ListEntry {
        movie_id,
        added_at: fixed_time(),
        rating: None,
        title: None,
        poster_path: None,
    }
}

pub fn summary(id: u64) -> MovieSummary {
    MovieSummary {
        id,
        title: format!("Movie {}", id),
        poster_path: None,
        release_date: None,
        vote_average: 6.0,
        genre_ids: Vec::new(),
    }
}

/// Backend whose lists are plain vectors. Individual lists can be made to
/// fail, or every call can be made to return 401.
#[derive(Default)]
pub struct FakeBackend {
    authenticated: AtomicBool,
    unauthorized: AtomicBool,
    offline: AtomicBool,
    lists: Mutex<HashMap<ListKind, Vec<ListEntry>>>,
    failing_lists: Mutex<HashSet<ListKind>>,
    pub list_calls: AtomicU32,
    pub cleared_sessions: AtomicU32,
    pub ratings: Mutex<Vec<(u64, u8)>>,
}

impl FakeBackend {
    pub fn signed_in() -> Arc<Self> {
        let backend = Self::default();
        backend.authenticated.store(true, Ordering::SeqCst);
        Arc::new(backend)
    }

    pub fn set_list(&self, kind: ListKind, ids: &[u64]) {
        let entries = ids.iter().map(|id| entry(*id)).collect();
        self.lists.lock().unwrap().insert(kind, entries);
    }

    pub fn set_entries(&self, kind: ListKind, entries: Vec<ListEntry>) {
        self.lists.lock().unwrap().insert(kind, entries);
    }

    pub fn ids(&self, kind: ListKind) -> Vec<u64> {
        self.lists
            .lock()
            .unwrap()
            .get(&kind)
            .map(|entries| entries.iter().map(|e| e.movie_id).collect())
            .unwrap_or_default()
    }

    pub fn fail_list(&self, kind: ListKind, failing: bool) {
        let mut failing_lists = self.failing_lists.lock().unwrap();
        if failing {
            failing_lists.insert(kind);
        } else {
            failing_lists.remove(&kind);
        }
    }

    pub fn reject_session(&self) {
        self.unauthorized.store(true, Ordering::SeqCst);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SourceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SourceError::Network("connection refused".to_string()));
        }
        if self.unauthorized.load(Ordering::SeqCst) || !self.authenticated.load(Ordering::SeqCst) {
            return Err(SourceError::Unauthorized("401".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TrackerBackend for FakeBackend {
    fn backend_name(&self) -> &str {
        "fake"
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn clear_session(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
        self.cleared_sessions.fetch_add(1, Ordering::SeqCst);
    }

    async fn ping(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    async fn get_profile(&self) -> Result<UserProfile, SourceError> {
        self.check()?;
        Ok(UserProfile {
            id: 7,
            username: "ada".to_string(),
            email: None,
            avatar: None,
            privacy: Some(PrivacySetting::Public),
            created_at: None,
        })
    }

    async fn get_list(&self, kind: ListKind) -> Result<Vec<ListEntry>, SourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        if self.failing_lists.lock().unwrap().contains(&kind) {
            return Err(SourceError::Network(format!("{} timed out", kind)));
        }
        Ok(self.lists.lock().unwrap().get(&kind).cloned().unwrap_or_default())
    }

    async fn add_to_list(&self, kind: ListKind, movie_id: u64) -> Result<(), SourceError> {
        self.check()?;
        let mut lists = self.lists.lock().unwrap();
        let entries = lists.entry(kind).or_default();
        if !entries.iter().any(|e| e.movie_id == movie_id) {
            entries.push(entry(movie_id));
        }
        Ok(())
    }

    async fn remove_from_list(&self, kind: ListKind, movie_id: u64) -> Result<(), SourceError> {
        self.check()?;
        if let Some(entries) = self.lists.lock().unwrap().get_mut(&kind) {
            entries.retain(|e| e.movie_id != movie_id);
        }
        Ok(())
    }

    async fn rate_movie(&self, movie_id: u64, rating: u8) -> Result<(), SourceError> {
        self.check()?;
        self.ratings.lock().unwrap().push((movie_id, rating));
        Ok(())
    }
}

/// Provider serving generated details and configurable listings.
///
/// Listings are keyed by endpoint path (`movie/popular`, `movie/5/similar`,
/// ...) and paginated `PAGE_SIZE` rows at a time.
#[derive(Default)]
pub struct FakeProvider {
    listings: Mutex<HashMap<String, Vec<u64>>>,
    failing_paths: Mutex<HashSet<String>>,
    failing_details: Mutex<HashSet<u64>>,
    pub detail_calls: Mutex<Vec<u64>>,
    pub page_requests: Mutex<Vec<(String, u32)>>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_listing(&self, path: &str, ids: impl IntoIterator<Item = u64>) {
        self.listings.lock().unwrap().insert(path.to_string(), ids.into_iter().collect());
    }

    pub fn fail_path(&self, path: &str) {
        self.failing_paths.lock().unwrap().insert(path.to_string());
    }

    pub fn fail_detail(&self, movie_id: u64, failing: bool) {
        let mut failing_details = self.failing_details.lock().unwrap();
        if failing {
            failing_details.insert(movie_id);
        } else {
            failing_details.remove(&movie_id);
        }
    }

    pub fn detail_call_count(&self) -> usize {
        self.detail_calls.lock().unwrap().len()
    }

    pub fn requested_paths(&self) -> Vec<String> {
        self.page_requests.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    fn page(&self, path: &str, page: u32) -> Result<MoviePage, SourceError> {
        self.page_requests.lock().unwrap().push((path.to_string(), page));
        if self.failing_paths.lock().unwrap().contains(path) {
            return Err(SourceError::Status {
                endpoint: path.to_string(),
                status: 500,
                body: String::new(),
            });
        }
        let listings = self.listings.lock().unwrap();
        let Some(ids) = listings.get(path) else {
            return Ok(MoviePage::empty(page));
        };
        let total_pages = ids.len().div_ceil(PAGE_SIZE) as u32;
        let start = (page.max(1) as usize - 1) * PAGE_SIZE;
        let results = ids.iter().skip(start).take(PAGE_SIZE).map(|id| summary(*id)).collect();
        Ok(MoviePage {
            page,
            total_pages,
            results,
        })
    }
}

#[async_trait]
impl MetadataProvider for FakeProvider {
    fn provider_name(&self) -> &str {
        "fake"
    }

    async fn movie_detail(&self, movie_id: u64) -> Result<MovieDetail, SourceError> {
        self.detail_calls.lock().unwrap().push(movie_id);
        if self.failing_details.lock().unwrap().contains(&movie_id) {
            return Err(SourceError::Network("detail timed out".to_string()));
        }
        Ok(MovieDetail {
            movie_id,
            title: format!("Movie {}", movie_id),
            poster_path: Some(format!("/poster{}.jpg", movie_id)),
            release_date: Some("2001-01-01".to_string()),
            genres: BTreeSet::new(),
            vote_average: 7.0,
            runtime: Some(100),
            cached_at: fixed_time(),
        })
    }

    async fn movie_list(&self, feed: MovieFeed, page: u32) -> Result<MoviePage, SourceError> {
        self.page(feed.path(), page)
    }

    async fn trending(&self, window: TrendingWindow, page: u32) -> Result<MoviePage, SourceError> {
        self.page(window.path(), page)
    }

    async fn recommendations(&self, movie_id: u64, page: u32) -> Result<MoviePage, SourceError> {
        self.page(&format!("movie/{}/recommendations", movie_id), page)
    }

    async fn similar(&self, movie_id: u64, page: u32) -> Result<MoviePage, SourceError> {
        self.page(&format!("movie/{}/similar", movie_id), page)
    }
}
