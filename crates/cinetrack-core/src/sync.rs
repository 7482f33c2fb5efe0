use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cinetrack_config::CacheConfig;
use cinetrack_models::{
    is_valid_rating, ListEntry, ListKind, MovieDetail, SyncCheckpoint, TrackedItem, UserProfile,
    CHECKPOINT_CACHE_ENABLED, CHECKPOINT_LAST_SYNC, CHECKPOINT_PROFILE,
};
use cinetrack_sources::{MetadataProvider, SourceError, TrackerBackend};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use crate::freshness;
use crate::store::{Collection, LocalStore, StoreError};
use crate::view::{LoadSlot, ViewState};

/// Source of "now"; swapped out in tests
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Cache state when nothing has been persisted yet
    pub enabled_by_default: bool,
    pub max_age_days: i64,
    pub detail_batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled_by_default: true,
            max_age_days: freshness::DEFAULT_MAX_AGE_DAYS,
            detail_batch_size: 10,
        }
    }
}

impl From<&CacheConfig> for SyncConfig {
    fn from(config: &CacheConfig) -> Self {
        Self {
            enabled_by_default: config.enabled,
            max_age_days: config.max_age_days,
            detail_batch_size: config.detail_batch_size.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    CacheDisabled,
    NotAuthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SyncStatus {
    /// Every list and the profile were refreshed
    Completed,
    /// At least one fetch failed; its previous copy was kept
    Partial,
    Skipped { reason: SkipReason },
    /// The backend rejected the session; it has been cleared
    SessionExpired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ListOutcome {
    Synced { count: usize },
    /// Fetch failed; the cached copy was left untouched
    Kept { error: String },
    NotFetched,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListReport {
    pub kind: ListKind,
    #[serde(flatten)]
    pub outcome: ListOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetailStats {
    /// Fresh entries served from the cache
    pub reused: usize,
    pub fetched: usize,
    /// Fetch failed; fell back to a stale copy or the bare record
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    #[serde(flatten)]
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
    pub lists: Vec<ListReport>,
    pub profile_synced: bool,
    pub details: DetailStats,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl SyncReport {
    fn new(status: SyncStatus, started_at: DateTime<Utc>) -> Self {
        Self {
            status,
            started_at,
            lists: ListKind::ALL
                .iter()
                .map(|kind| ListReport {
                    kind: *kind,
                    outcome: ListOutcome::NotFetched,
                })
                .collect(),
            profile_synced: false,
            details: DetailStats::default(),
            errors: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, SyncStatus::Skipped { .. })
    }

    pub fn outcome(&self, kind: ListKind) -> Option<&ListOutcome> {
        self.lists.iter().find(|l| l.kind == kind).map(|l| &l.outcome)
    }

    fn set_outcome(&mut self, kind: ListKind, outcome: ListOutcome) {
        if let Some(list) = self.lists.iter_mut().find(|l| l.kind == kind) {
            list.outcome = outcome;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionCount {
    pub collection: &'static str,
    pub records: usize,
}

/// Diagnostics for `status`
#[derive(Debug, Clone, Serialize)]
pub struct StorageHealth {
    pub enabled: bool,
    pub schema_version: u32,
    pub collections: Vec<CollectionCount>,
    pub estimated_bytes: u64,
    pub stale_details: usize,
    pub last_sync: Option<DateTime<Utc>>,
    pub profile: Option<UserProfile>,
    pub seen_ids: Option<usize>,
}

/// One page of a list as shown by `cinetrack list`
#[derive(Debug, Clone, Serialize)]
pub struct ListPage {
    pub kind: ListKind,
    pub page: u32,
    pub total_pages: u32,
    pub total_items: usize,
    pub from_cache: bool,
    pub items: Vec<TrackedItem>,
}

/// How one entry's detail was resolved
enum Resolution {
    Fresh(MovieDetail),
    Fetched(MovieDetail),
    Degraded(Option<MovieDetail>),
    /// No provider attached and nothing cached
    Unavailable,
}

impl Resolution {
    fn detail(&self) -> Option<&MovieDetail> {
        match self {
            Resolution::Fresh(d) | Resolution::Fetched(d) => Some(d),
            Resolution::Degraded(d) => d.as_ref(),
            Resolution::Unavailable => None,
        }
    }
}

/// Mirrors backend lists into the local store and enriches them with cached
/// provider detail.
pub struct SyncEngine {
    store: Arc<LocalStore>,
    backend: Arc<dyn TrackerBackend>,
    provider: Option<Arc<dyn MetadataProvider>>,
    view: Option<Arc<ViewState>>,
    config: SyncConfig,
    clock: Clock,
}

impl SyncEngine {
    pub fn new(store: Arc<LocalStore>, backend: Arc<dyn TrackerBackend>, config: SyncConfig) -> Self {
        Self {
            store,
            backend,
            provider: None,
            view: None,
            config,
            clock: Arc::new(Utc::now),
        }
    }

    /// Attach a metadata provider; without one, entries keep whatever detail is cached
    pub fn with_provider(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Attach a view whose seen set is rebuilt after each round
    pub fn with_view(mut self, view: Arc<ViewState>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn backend(&self) -> &Arc<dyn TrackerBackend> {
        &self.backend
    }

    pub fn view(&self) -> Option<&Arc<ViewState>> {
        self.view.as_ref()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub async fn is_enabled(&self) -> Result<bool> {
        let checkpoint: Option<SyncCheckpoint> = self.store.get(Collection::Settings, CHECKPOINT_CACHE_ENABLED).await?;
        Ok(checkpoint
            .and_then(|c| c.value.as_bool())
            .unwrap_or(self.config.enabled_by_default))
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        let mut checkpoint = SyncCheckpoint::new(CHECKPOINT_CACHE_ENABLED, serde_json::Value::Bool(enabled));
        checkpoint.updated_at = self.now();
        self.store.put(Collection::Settings, &checkpoint).await?;
        info!(operation = "cache_toggle", enabled = enabled, "Local cache preference updated");
        Ok(())
    }

    pub async fn last_sync(&self) -> Result<Option<DateTime<Utc>>> {
        let checkpoint: Option<SyncCheckpoint> = self.store.get(Collection::Settings, CHECKPOINT_LAST_SYNC).await?;
        Ok(checkpoint.map(|c| c.updated_at))
    }

    pub async fn cached_profile(&self) -> Result<Option<UserProfile>> {
        let checkpoint: Option<SyncCheckpoint> = self.store.get(Collection::Settings, CHECKPOINT_PROFILE).await?;
        Ok(checkpoint.and_then(|c| serde_json::from_value(c.value).ok()))
    }

    /// Cached copy of a list, or `None` when caching is off (callers then go to the backend).
    /// Never touches the network.
    pub async fn get_list(&self, kind: ListKind) -> Result<Option<Vec<TrackedItem>>> {
        if !self.is_enabled().await? {
            return Ok(None);
        }
        Ok(Some(self.store.get_all(Collection::for_list(kind)).await?))
    }

    /// Live list straight from the backend. A rejected session is cleared.
    pub async fn fetch_list(&self, kind: ListKind) -> Result<Vec<ListEntry>, SourceError> {
        self.check_auth(self.backend.get_list(kind).await)
    }

    /// Load the page under the view's cursor for `kind` and advance the cursor.
    ///
    /// Serves the cached list unless `live` is set or caching is off. Returns
    /// `None` while another load of the same list holds its slot.
    pub async fn load_list_page(&self, kind: ListKind, page_size: usize, live: bool) -> Result<Option<ListPage>> {
        let view = self.view.as_ref().context("Paged list loads need a view attached")?;
        let Some(_guard) = view.try_begin_load(LoadSlot::from(kind)) else {
            debug!(list = %kind, "List load already in flight");
            return Ok(None);
        };

        let cached = if live { None } else { self.get_list(kind).await? };
        let from_cache = cached.is_some();
        let all = match cached {
            Some(items) => items,
            None => self
                .fetch_list(kind)
                .await?
                .iter()
                .map(|e| TrackedItem::from_entry(e, kind))
                .collect(),
        };

        let page_size = page_size.max(1);
        let total_items = all.len();
        let total_pages = total_items.div_ceil(page_size) as u32;
        let page = view.page(kind);
        let offset = (page as usize - 1).saturating_mul(page_size);
        let items: Vec<TrackedItem> = all.into_iter().skip(offset).take(page_size).collect();
        if !items.is_empty() {
            view.next_page(kind);
        }

        Ok(Some(ListPage {
            kind,
            page,
            total_pages,
            total_items,
            from_cache,
            items,
        }))
    }

    /// One full reconciliation round from the backend into the store
    #[instrument(skip(self), fields(backend = self.backend.backend_name()))]
    pub async fn sync_all(&self) -> Result<SyncReport> {
        let started = Instant::now();
        let started_at = self.now();

        if !self.is_enabled().await? {
            debug!("Local cache disabled, skipping sync");
            return Ok(SyncReport::new(
                SyncStatus::Skipped { reason: SkipReason::CacheDisabled },
                started_at,
            ));
        }
        if !self.backend.is_authenticated() {
            debug!("No session, skipping sync");
            return Ok(SyncReport::new(
                SyncStatus::Skipped { reason: SkipReason::NotAuthenticated },
                started_at,
            ));
        }

        info!(operation = "sync_start", "Starting sync round");
        let mut report = SyncReport::new(SyncStatus::Completed, started_at);

        let (profile, watchlist, watched, likes) = tokio::join!(
            self.backend.get_profile(),
            self.backend.get_list(ListKind::Watchlist),
            self.backend.get_list(ListKind::Watched),
            self.backend.get_list(ListKind::Liked),
        );

        let auth_failed =
            rejected(&profile) || rejected(&watchlist) || rejected(&watched) || rejected(&likes);
        if auth_failed {
            warn!(operation = "sync_auth_failed", "Backend rejected the session, clearing it");
            self.backend.clear_session();
            report.status = SyncStatus::SessionExpired;
            report.errors.push("Session expired, sign in again".to_string());
            report.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(report);
        }

        match profile {
            Ok(profile) => {
                let mut checkpoint = SyncCheckpoint::new(CHECKPOINT_PROFILE, serde_json::to_value(&profile)?);
                checkpoint.updated_at = started_at;
                self.store.put(Collection::Settings, &checkpoint).await?;
                report.profile_synced = true;
            }
            Err(e) => {
                warn!(operation = "sync_profile", error = %e, "Profile fetch failed");
                report.errors.push(format!("profile: {}", e));
            }
        }

        // Enrichment runs list by list so a movie in several lists is fetched once
        let mut seen_sources: Vec<(ListKind, Option<HashSet<u64>>)> = Vec::new();
        for (kind, fetched) in [
            (ListKind::Watchlist, watchlist),
            (ListKind::Watched, watched),
            (ListKind::Liked, likes),
        ] {
            match fetched {
                Ok(entries) => {
                    let items = self.enrich_entries(kind, &entries, &mut report.details).await?;
                    let count = self.store.replace_all(Collection::for_list(kind), &items).await?;
                    info!(operation = "sync_list", list = %kind, count = count, "List synced");
                    report.set_outcome(kind, ListOutcome::Synced { count });
                    seen_sources.push((kind, Some(items.iter().map(|i| i.movie_id).collect())));
                }
                Err(e) => {
                    warn!(operation = "sync_list", list = %kind, error = %e, "List fetch failed, keeping cached copy");
                    report.errors.push(format!("{}: {}", kind, e));
                    report.set_outcome(kind, ListOutcome::Kept { error: e.to_string() });
                    seen_sources.push((kind, None));
                }
            }
        }

        if let Some(view) = &self.view {
            let mut seen = HashSet::new();
            for (kind, ids) in seen_sources.into_iter().filter(|(kind, _)| kind.counts_as_seen()) {
                match ids {
                    Some(ids) => seen.extend(ids),
                    None => seen.extend(self.cached_ids(kind).await?),
                }
            }
            debug!(seen = seen.len(), "Rebuilt seen set");
            view.rebuild_seen(seen);
        }

        let any_synced = report
            .lists
            .iter()
            .any(|l| matches!(l.outcome, ListOutcome::Synced { .. }));
        if any_synced {
            self.store
                .put(Collection::Settings, &SyncCheckpoint::last_sync(started_at))
                .await?;
        }

        if !report.errors.is_empty() {
            report.status = SyncStatus::Partial;
        }
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            operation = "sync_complete",
            status = ?report.status,
            fetched = report.details.fetched,
            reused = report.details.reused,
            failed = report.details.failed,
            duration_ms = report.duration_ms,
            "Sync round finished"
        );
        Ok(report)
    }

    async fn cached_ids(&self, kind: ListKind) -> Result<Vec<u64>, StoreError> {
        let items: Vec<TrackedItem> = self.store.get_all(Collection::for_list(kind)).await?;
        Ok(items.into_iter().map(|i| i.movie_id).collect())
    }

    /// Attach detail to each entry, fetching in sequential batches of concurrent requests
    async fn enrich_entries(
        &self,
        kind: ListKind,
        entries: &[ListEntry],
        stats: &mut DetailStats,
    ) -> Result<Vec<TrackedItem>> {
        let mut items = Vec::with_capacity(entries.len());

        for (batch_index, batch) in entries.chunks(self.config.detail_batch_size).enumerate() {
            debug!(list = %kind, batch = batch_index, size = batch.len(), "Resolving detail batch");
            let resolutions = join_all(batch.iter().map(|entry| self.resolve_detail(entry.movie_id))).await;

            let mut fetched = Vec::new();
            for (entry, resolution) in batch.iter().zip(resolutions) {
                let resolution = resolution?;
                match &resolution {
                    Resolution::Fresh(_) => stats.reused += 1,
                    Resolution::Fetched(detail) => {
                        stats.fetched += 1;
                        fetched.push(detail.clone());
                    }
                    Resolution::Degraded(_) => stats.failed += 1,
                    Resolution::Unavailable => {}
                }
                items.push(TrackedItem::from_entry(entry, kind).with_detail(resolution.detail().cloned()));
            }
            self.store.put_many(Collection::MoviesCache, &fetched).await?;
        }

        Ok(items)
    }

    /// Cached detail if fresh, otherwise a fresh fetch, otherwise whatever is cached
    async fn resolve_detail(&self, movie_id: u64) -> Result<Resolution, StoreError> {
        let cached: Option<MovieDetail> = self.store.get(Collection::MoviesCache, movie_id).await?;
        let now = self.now();

        if let Some(detail) = &cached {
            if !freshness::is_expired_at(Some(detail.cached_at), self.config.max_age_days, now) {
                return Ok(Resolution::Fresh(detail.clone()));
            }
        }

        let Some(provider) = &self.provider else {
            return Ok(match cached {
                Some(detail) => Resolution::Degraded(Some(detail)),
                None => Resolution::Unavailable,
            });
        };

        match provider.movie_detail(movie_id).await {
            Ok(mut detail) => {
                detail.cached_at = now;
                Ok(Resolution::Fetched(detail))
            }
            Err(e) => {
                warn!(
                    operation = "detail_fetch",
                    movie_id = movie_id,
                    error = %e,
                    has_stale = cached.is_some(),
                    "Detail fetch failed, degrading"
                );
                Ok(Resolution::Degraded(cached))
            }
        }
    }

    /// Detail for a single movie, caching it when freshly fetched
    pub async fn movie_detail(&self, movie_id: u64) -> Result<Option<MovieDetail>> {
        let resolution = self.resolve_detail(movie_id).await?;
        if let Resolution::Fetched(detail) = &resolution {
            self.store.put(Collection::MoviesCache, detail).await?;
        }
        Ok(resolution.detail().cloned())
    }

    fn check_auth<T>(&self, result: Result<T, SourceError>) -> Result<T, SourceError> {
        if let Err(e) = &result {
            if e.is_auth() {
                warn!(operation = "session_rejected", "Backend rejected the session, clearing it");
                self.backend.clear_session();
            }
        }
        result
    }

    /// Add a movie to a list: backend first, then the local mirror
    pub async fn track(&self, kind: ListKind, movie_id: u64) -> Result<TrackedItem> {
        self.check_auth(self.backend.add_to_list(kind, movie_id).await)?;

        let detail = self.movie_detail(movie_id).await?;
        let item = TrackedItem::new(movie_id, kind, self.now()).with_detail(detail);
        if self.is_enabled().await? {
            self.store.put(Collection::for_list(kind), &item).await?;
        }
        if kind.counts_as_seen() {
            if let Some(view) = &self.view {
                view.mark_seen(movie_id);
            }
        }
        info!(operation = "track", list = %kind, movie_id = movie_id, "Movie tracked");
        Ok(item)
    }

    /// Remove a movie from a list. The seen set is left alone until the next sync.
    pub async fn untrack(&self, kind: ListKind, movie_id: u64) -> Result<bool> {
        self.check_auth(self.backend.remove_from_list(kind, movie_id).await)?;
        let removed = self.store.delete(Collection::for_list(kind), movie_id).await?;
        info!(operation = "untrack", list = %kind, movie_id = movie_id, removed_locally = removed, "Movie untracked");
        Ok(removed)
    }

    /// Rate a movie. A rating implies watched, so the watched row is created if missing.
    pub async fn rate(&self, movie_id: u64, rating: u8) -> Result<TrackedItem> {
        if !is_valid_rating(rating) {
            return Err(SourceError::InvalidInput(format!("rating must be 1-10, got {}", rating)).into());
        }
        self.check_auth(self.backend.rate_movie(movie_id, rating).await)?;

        let existing: Option<TrackedItem> = self.store.get(Collection::Watched, movie_id).await?;
        let mut item = match existing {
            Some(item) => item,
            None => {
                let detail = self.movie_detail(movie_id).await?;
                TrackedItem::new(movie_id, ListKind::Watched, self.now()).with_detail(detail)
            }
        };
        item.rating = Some(rating);

        if self.is_enabled().await? {
            self.store.put(Collection::Watched, &item).await?;
        }
        if let Some(view) = &self.view {
            view.mark_seen(movie_id);
        }
        info!(operation = "rate", movie_id = movie_id, rating = rating, "Movie rated");
        Ok(item)
    }

    pub async fn storage_health(&self) -> Result<StorageHealth> {
        let collections = self
            .store
            .counts()
            .await?
            .into_iter()
            .map(|(collection, records)| CollectionCount {
                collection: collection.name(),
                records,
            })
            .collect();

        // An age window too large for chrono means nothing is ever stale
        let stale = match ChronoDuration::try_days(self.config.max_age_days)
            .and_then(|window| self.now().checked_sub_signed(window))
        {
            Some(cutoff) => {
                let stale: Vec<MovieDetail> = self
                    .store
                    .get_all_by_index(Collection::MoviesCache, ..=cutoff.timestamp_millis())
                    .await?;
                stale.len()
            }
            None => 0,
        };

        Ok(StorageHealth {
            enabled: self.is_enabled().await?,
            schema_version: self.store.schema_version(),
            collections,
            estimated_bytes: self.store.estimated_bytes().await?,
            stale_details: stale,
            last_sync: self.last_sync().await?,
            profile: self.cached_profile().await?,
            seen_ids: self.view.as_ref().map(|v| v.seen_count()),
        })
    }

    /// Destroy every local collection and forget the seen set
    pub async fn reset_database(&self) -> Result<()> {
        self.store.reset_store().await?;
        if let Some(view) = &self.view {
            view.clear_seen();
        }
        info!(operation = "reset_database", "Local database reset");
        Ok(())
    }
}

fn rejected<T>(result: &Result<T, SourceError>) -> bool {
    matches!(result, Err(e) if e.is_auth())
}

/// Whether an error chain bottoms out in a rejected session
pub fn is_session_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SourceError>().is_some_and(SourceError::is_auth)
}

#[cfg(test)]
mod tests;
