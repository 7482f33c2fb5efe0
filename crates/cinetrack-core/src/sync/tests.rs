use super::*;
use crate::store::StoreOptions;
use crate::testing::{entry, fixed_time, FakeBackend, FakeProvider};
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    store: Arc<LocalStore>,
    backend: Arc<FakeBackend>,
    provider: Arc<FakeProvider>,
    view: Arc<ViewState>,
    now: Arc<Mutex<DateTime<Utc>>>,
    engine: SyncEngine,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    fn with_config(config: SyncConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(StoreOptions::new(dir.path().join("store"))));
        let backend = FakeBackend::signed_in();
        let provider = FakeProvider::new();
        let view = Arc::new(ViewState::new());
        let now = Arc::new(Mutex::new(fixed_time()));

        let clock_now = now.clone();
        let engine = SyncEngine::new(store.clone(), backend.clone(), config)
            .with_provider(provider.clone())
            .with_view(view.clone())
            .with_clock(Arc::new(move || *clock_now.lock().unwrap()));

        Self {
            _dir: dir,
            store,
            backend,
            provider,
            view,
            now,
            engine,
        }
    }

    fn advance(&self, by: ChronoDuration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    async fn cached_ids(&self, kind: ListKind) -> Vec<u64> {
        self.engine
            .get_list(kind)
            .await
            .unwrap()
            .unwrap()
            .iter()
            .map(|i| i.movie_id)
            .collect()
    }

    fn collection_bytes(&self, collection: Collection) -> Vec<u8> {
        std::fs::read(self.store.dir().join(format!("{}.json", collection.name()))).unwrap()
    }
}

#[tokio::test]
async fn test_sync_mirrors_backend_lists_exactly() {
    let h = Harness::new();
    h.backend.set_list(ListKind::Watchlist, &[3, 1, 2]);
    h.backend.set_list(ListKind::Watched, &[10]);
    h.backend.set_list(ListKind::Liked, &[10, 3]);

    let report = h.engine.sync_all().await.unwrap();
    assert_eq!(report.status, SyncStatus::Completed);
    assert!(report.profile_synced);
    assert_eq!(report.outcome(ListKind::Watchlist), Some(&ListOutcome::Synced { count: 3 }));

    assert_eq!(h.cached_ids(ListKind::Watchlist).await, vec![3, 1, 2]);
    assert_eq!(h.cached_ids(ListKind::Watched).await, vec![10]);
    assert_eq!(h.cached_ids(ListKind::Liked).await, vec![10, 3]);

    // Removals on the server disappear locally on the next round
    h.backend.set_list(ListKind::Watchlist, &[2]);
    h.engine.sync_all().await.unwrap();
    assert_eq!(h.cached_ids(ListKind::Watchlist).await, vec![2]);

    let items = h.engine.get_list(ListKind::Watched).await.unwrap().unwrap();
    assert_eq!(items[0].title(), Some("Movie 10"));
    assert_eq!(items[0].list_kind, ListKind::Watched);
    assert!(h.engine.last_sync().await.unwrap().is_some());
    assert_eq!(h.engine.cached_profile().await.unwrap().unwrap().username, "ada");
}

#[tokio::test]
async fn test_details_are_refetched_after_seven_days_and_not_before() {
    let h = Harness::new();
    h.backend.set_list(ListKind::Watchlist, &[1, 2, 3]);

    h.engine.sync_all().await.unwrap();
    assert_eq!(h.provider.detail_call_count(), 3);

    h.advance(ChronoDuration::days(7) - ChronoDuration::milliseconds(1));
    let report = h.engine.sync_all().await.unwrap();
    assert_eq!(h.provider.detail_call_count(), 3);
    assert_eq!(report.details.reused, 3);

    h.advance(ChronoDuration::milliseconds(1));
    let report = h.engine.sync_all().await.unwrap();
    assert_eq!(h.provider.detail_call_count(), 6);
    assert_eq!(report.details.fetched, 3);

    let detail: MovieDetail = h.store.get(Collection::MoviesCache, 1).await.unwrap().unwrap();
    assert_eq!(detail.cached_at, fixed_time() + ChronoDuration::days(7));
}

#[tokio::test]
async fn test_repeated_sync_is_byte_identical() {
    let h = Harness::new();
    h.backend.set_list(ListKind::Watchlist, &[5, 6]);
    h.backend.set_list(ListKind::Watched, &[7]);
    h.backend.set_list(ListKind::Liked, &[5]);

    h.engine.sync_all().await.unwrap();
    let collections = [
        Collection::Watchlist,
        Collection::Watched,
        Collection::Likes,
        Collection::MoviesCache,
    ];
    let before: Vec<Vec<u8>> = collections.iter().map(|c| h.collection_bytes(*c)).collect();

    h.advance(ChronoDuration::hours(1));
    h.engine.sync_all().await.unwrap();
    let after: Vec<Vec<u8>> = collections.iter().map(|c| h.collection_bytes(*c)).collect();

    assert_eq!(before, after);
}

#[tokio::test]
async fn test_seen_set_is_watchlist_union_watched() {
    let h = Harness::new();
    h.view.mark_all_seen([99, 100]);
    h.backend.set_list(ListKind::Watchlist, &[1, 2]);
    h.backend.set_list(ListKind::Watched, &[2, 3]);
    h.backend.set_list(ListKind::Liked, &[4]);

    h.engine.sync_all().await.unwrap();

    assert_eq!(h.view.seen_snapshot(), HashSet::from([1, 2, 3]));
}

#[tokio::test]
async fn test_offline_get_list_serves_last_sync() {
    let h = Harness::new();
    h.backend.set_list(ListKind::Watchlist, &[1, 2]);
    h.engine.sync_all().await.unwrap();

    h.backend.set_offline(true);
    let report = h.engine.sync_all().await.unwrap();
    assert_eq!(report.status, SyncStatus::Partial);
    assert!(matches!(report.outcome(ListKind::Watchlist), Some(ListOutcome::Kept { .. })));

    assert_eq!(h.cached_ids(ListKind::Watchlist).await, vec![1, 2]);
    assert_eq!(h.view.seen_snapshot(), HashSet::from([1, 2]));
}

#[tokio::test]
async fn test_failed_list_keeps_previous_copy_only_for_that_list() {
    let h = Harness::new();
    h.backend.set_list(ListKind::Watchlist, &[1]);
    h.backend.set_list(ListKind::Watched, &[2]);
    h.engine.sync_all().await.unwrap();

    h.backend.set_list(ListKind::Watchlist, &[1, 5]);
    h.backend.set_list(ListKind::Watched, &[2, 6]);
    h.backend.fail_list(ListKind::Watched, true);
    let report = h.engine.sync_all().await.unwrap();

    assert_eq!(report.status, SyncStatus::Partial);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(h.cached_ids(ListKind::Watchlist).await, vec![1, 5]);
    assert_eq!(h.cached_ids(ListKind::Watched).await, vec![2]);
    // Seen set falls back to the cached watched copy
    assert_eq!(h.view.seen_snapshot(), HashSet::from([1, 5, 2]));
}

#[tokio::test]
async fn test_rejected_session_is_cleared_and_cache_untouched() {
    let h = Harness::new();
    h.backend.set_list(ListKind::Watchlist, &[1]);
    h.engine.sync_all().await.unwrap();

    h.backend.reject_session();
    let report = h.engine.sync_all().await.unwrap();

    assert_eq!(report.status, SyncStatus::SessionExpired);
    assert_eq!(h.backend.cleared_sessions.load(Ordering::SeqCst), 1);
    assert!(!h.backend.is_authenticated());
    assert_eq!(h.cached_ids(ListKind::Watchlist).await, vec![1]);

    // With the session gone the next round is skipped outright
    let report = h.engine.sync_all().await.unwrap();
    assert_eq!(report.status, SyncStatus::Skipped { reason: SkipReason::NotAuthenticated });
}

#[tokio::test]
async fn test_failed_enrichment_degrades_to_stale_then_bare() {
    let h = Harness::new();
    h.backend.set_list(ListKind::Watchlist, &[1]);
    h.engine.sync_all().await.unwrap();

    h.advance(ChronoDuration::days(8));
    h.backend.set_list(ListKind::Watchlist, &[1, 2]);
    h.provider.fail_detail(1, true);
    h.provider.fail_detail(2, true);
    let report = h.engine.sync_all().await.unwrap();

    assert_eq!(report.details.failed, 2);
    assert_eq!(report.status, SyncStatus::Completed);

    let items = h.engine.get_list(ListKind::Watchlist).await.unwrap().unwrap();
    let stale = items[0].cached_detail.as_ref().unwrap();
    assert_eq!(stale.cached_at, fixed_time());
    assert!(items[1].cached_detail.is_none());
    assert_eq!(items[1].movie_id, 2);
}

#[tokio::test]
async fn test_detail_fetches_are_batched_and_shared_across_lists() {
    let h = Harness::with_config(SyncConfig {
        detail_batch_size: 4,
        ..SyncConfig::default()
    });
    let ids: Vec<u64> = (1..=10).collect();
    h.backend.set_list(ListKind::Watchlist, &ids);
    h.backend.set_list(ListKind::Liked, &[1, 2, 3]);

    let report = h.engine.sync_all().await.unwrap();

    assert_eq!(h.provider.detail_call_count(), 10);
    assert_eq!(report.details.fetched, 10);
    assert_eq!(report.details.reused, 3);

    // Batches are sequential: the first four requests are ids 1..=4 in some order
    let mut first_batch: Vec<u64> = h.provider.detail_calls.lock().unwrap()[..4].to_vec();
    first_batch.sort();
    assert_eq!(first_batch, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_invalid_backend_ratings_are_dropped() {
    let h = Harness::new();
    let mut rated = entry(1);
    rated.rating = Some(11);
    let mut valid = entry(2);
    valid.rating = Some(9);
    h.backend.set_entries(ListKind::Watched, vec![rated, valid]);

    h.engine.sync_all().await.unwrap();
    let items = h.engine.get_list(ListKind::Watched).await.unwrap().unwrap();
    assert_eq!(items[0].rating, None);
    assert_eq!(items[1].rating, Some(9));
}

#[tokio::test]
async fn test_disabled_cache_skips_sync_and_get_list() {
    let h = Harness::new();
    h.backend.set_list(ListKind::Watchlist, &[1]);
    assert!(h.engine.is_enabled().await.unwrap());

    h.engine.set_enabled(false).await.unwrap();
    let report = h.engine.sync_all().await.unwrap();

    assert_eq!(report.status, SyncStatus::Skipped { reason: SkipReason::CacheDisabled });
    assert_eq!(h.backend.list_calls.load(Ordering::SeqCst), 0);
    assert!(h.engine.get_list(ListKind::Watchlist).await.unwrap().is_none());

    h.engine.set_enabled(true).await.unwrap();
    assert!(!h.engine.sync_all().await.unwrap().is_skipped());
}

#[tokio::test]
async fn test_track_untrack_and_rate_write_through() {
    let h = Harness::new();

    let item = h.engine.track(ListKind::Watchlist, 42).await.unwrap();
    assert_eq!(item.title(), Some("Movie 42"));
    assert_eq!(h.backend.ids(ListKind::Watchlist), vec![42]);
    assert_eq!(h.cached_ids(ListKind::Watchlist).await, vec![42]);
    assert!(h.view.is_seen(42));

    h.engine.track(ListKind::Liked, 43).await.unwrap();
    assert!(!h.view.is_seen(43));

    assert!(h.engine.untrack(ListKind::Watchlist, 42).await.unwrap());
    assert!(h.backend.ids(ListKind::Watchlist).is_empty());
    assert!(h.cached_ids(ListKind::Watchlist).await.is_empty());
    assert!(h.view.is_seen(42));

    let rated = h.engine.rate(44, 8).await.unwrap();
    assert_eq!(rated.rating, Some(8));
    assert_eq!(*h.backend.ratings.lock().unwrap(), vec![(44, 8)]);
    let watched: TrackedItem = h.store.get(Collection::Watched, 44).await.unwrap().unwrap();
    assert_eq!(watched.rating, Some(8));

    assert!(h.engine.rate(44, 0).await.is_err());
}

#[tokio::test]
async fn test_user_action_with_rejected_session_clears_it() {
    let h = Harness::new();
    h.backend.reject_session();

    let err = h.engine.track(ListKind::Watchlist, 1).await.unwrap_err();
    assert!(is_session_error(&err));
    assert_eq!(h.backend.cleared_sessions.load(Ordering::SeqCst), 1);
    assert!(h.cached_ids(ListKind::Watchlist).await.is_empty());
}

#[tokio::test]
async fn test_storage_health_and_reset() {
    let h = Harness::new();
    h.backend.set_list(ListKind::Watchlist, &[1, 2]);
    h.engine.sync_all().await.unwrap();

    h.advance(ChronoDuration::days(10));
    let health = h.engine.storage_health().await.unwrap();
    assert!(health.enabled);
    assert_eq!(health.stale_details, 2);
    assert_eq!(health.seen_ids, Some(2));
    assert_eq!(health.last_sync, Some(fixed_time()));
    let watchlist = health.collections.iter().find(|c| c.collection == "watchlist").unwrap();
    assert_eq!(watchlist.records, 2);
    assert!(health.estimated_bytes > 0);

    h.engine.reset_database().await.unwrap();
    assert!(h.cached_ids(ListKind::Watchlist).await.is_empty());
    assert_eq!(h.view.seen_count(), 0);
    assert!(h.engine.last_sync().await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_pages_advance_the_cursor() {
    let h = Harness::new();
    h.backend.set_list(ListKind::Watched, &[1, 2, 3, 4, 5]);
    h.engine.sync_all().await.unwrap();

    let first = h.engine.load_list_page(ListKind::Watched, 2, false).await.unwrap().unwrap();
    assert!(first.from_cache);
    assert_eq!((first.page, first.total_pages, first.total_items), (1, 3, 5));
    assert_eq!(first.items.iter().map(|i| i.movie_id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(h.view.page(ListKind::Watched), 2);

    h.engine.load_list_page(ListKind::Watched, 2, false).await.unwrap();
    let last = h.engine.load_list_page(ListKind::Watched, 2, false).await.unwrap().unwrap();
    assert_eq!(last.page, 3);
    assert_eq!(last.items.iter().map(|i| i.movie_id).collect::<Vec<_>>(), vec![5]);

    let past_end = h.engine.load_list_page(ListKind::Watched, 2, false).await.unwrap().unwrap();
    assert!(past_end.items.is_empty());
    assert_eq!(h.view.page(ListKind::Watched), 4);
    assert_eq!(h.view.page(ListKind::Watchlist), 1);
}

#[tokio::test]
async fn test_list_load_refused_while_slot_is_held() {
    let h = Harness::new();
    let _guard = h.view.try_begin_load(LoadSlot::Watchlist).unwrap();

    assert!(h.engine.load_list_page(ListKind::Watchlist, 20, false).await.unwrap().is_none());
    assert!(h.engine.load_list_page(ListKind::Liked, 20, false).await.unwrap().is_some());
    assert_eq!(h.view.page(ListKind::Watchlist), 1);
}

#[tokio::test]
async fn test_live_list_page_with_rejected_session_clears_it() {
    let h = Harness::new();
    h.engine.set_enabled(false).await.unwrap();
    h.backend.set_list(ListKind::Watchlist, &[8, 9]);

    let page = h.engine.load_list_page(ListKind::Watchlist, 20, false).await.unwrap().unwrap();
    assert!(!page.from_cache);
    assert_eq!(page.total_items, 2);

    h.backend.reject_session();
    let err = h.engine.load_list_page(ListKind::Watchlist, 20, true).await.unwrap_err();
    assert!(is_session_error(&err));
    assert_eq!(h.backend.cleared_sessions.load(Ordering::SeqCst), 1);
    assert!(!h.view.is_loading(LoadSlot::Watchlist));
}

#[tokio::test]
async fn test_storage_health_with_unbounded_max_age() {
    let h = Harness::with_config(SyncConfig {
        max_age_days: i64::MAX,
        ..SyncConfig::default()
    });
    h.backend.set_list(ListKind::Watchlist, &[1]);
    h.engine.sync_all().await.unwrap();

    let health = h.engine.storage_health().await.unwrap();
    assert_eq!(health.stale_details, 0);
}
