use super::*;
use chrono::{Duration as ChronoDuration, TimeZone};
use cinetrack_models::{MovieDetail, SyncCheckpoint, TrackedItem};
use std::collections::BTreeSet;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> LocalStore {
    LocalStore::new(StoreOptions::new(dir.path().join("store")))
}

fn item(movie_id: u64, kind: ListKind) -> TrackedItem {
    TrackedItem::new(movie_id, kind, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
}

fn detail(movie_id: u64, cached_at: DateTime<Utc>) -> MovieDetail {
    MovieDetail {
        movie_id,
        title: format!("Movie {}", movie_id),
        poster_path: None,
        release_date: Some("2010-07-16".to_string()),
        genres: BTreeSet::new(),
        vote_average: 7.5,
        runtime: Some(120),
        cached_at,
    }
}

#[tokio::test]
async fn test_put_and_get_round_trip_by_primary_key() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let key = store.put(Collection::Watchlist, &item(27205, ListKind::Watchlist)).await.unwrap();
    assert_eq!(key, "27205");

    let found: Option<TrackedItem> = store.get(Collection::Watchlist, 27205).await.unwrap();
    assert_eq!(found.unwrap().movie_id, 27205);

    let missing: Option<TrackedItem> = store.get(Collection::Watchlist, 1).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_put_is_last_write_wins_and_keeps_order() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store.put(Collection::Watched, &item(1, ListKind::Watched)).await.unwrap();
    store.put(Collection::Watched, &item(2, ListKind::Watched)).await.unwrap();
    let mut rated = item(1, ListKind::Watched);
    rated.rating = Some(8);
    store.put(Collection::Watched, &rated).await.unwrap();

    let all: Vec<TrackedItem> = store.get_all(Collection::Watched).await.unwrap();
    assert_eq!(all.iter().map(|i| i.movie_id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(all[0].rating, Some(8));
}

#[tokio::test]
async fn test_put_without_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let err = store
        .put(Collection::Settings, &serde_json::json!({"value": 1}))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingKey { field: "key", .. }));
}

#[tokio::test]
async fn test_delete_and_clear() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    for id in [1, 2, 3] {
        store.put(Collection::Likes, &item(id, ListKind::Liked)).await.unwrap();
    }
    assert!(store.delete(Collection::Likes, 2).await.unwrap());
    assert!(!store.delete(Collection::Likes, 2).await.unwrap());

    let ids: Vec<u64> = store
        .get_all::<TrackedItem>(Collection::Likes)
        .await
        .unwrap()
        .iter()
        .map(|i| i.movie_id)
        .collect();
    assert_eq!(ids, vec![1, 3]);

    // Position map stays consistent after a removal
    let third: Option<TrackedItem> = store.get(Collection::Likes, 3).await.unwrap();
    assert_eq!(third.unwrap().movie_id, 3);

    store.clear(Collection::Likes).await.unwrap();
    store.clear(Collection::Likes).await.unwrap();
    assert!(store.get_all::<TrackedItem>(Collection::Likes).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_replace_all_swaps_contents() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store.put(Collection::Watchlist, &item(1, ListKind::Watchlist)).await.unwrap();
    store
        .replace_all(Collection::Watchlist, &[item(5, ListKind::Watchlist), item(6, ListKind::Watchlist)])
        .await
        .unwrap();

    let ids: Vec<u64> = store
        .get_all::<TrackedItem>(Collection::Watchlist)
        .await
        .unwrap()
        .iter()
        .map(|i| i.movie_id)
        .collect();
    assert_eq!(ids, vec![5, 6]);
}

#[tokio::test]
async fn test_get_all_by_index_orders_by_cached_at() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    store.put(Collection::MoviesCache, &detail(1, base + ChronoDuration::days(3))).await.unwrap();
    store.put(Collection::MoviesCache, &detail(2, base)).await.unwrap();
    store.put(Collection::MoviesCache, &detail(3, base + ChronoDuration::days(10))).await.unwrap();

    let cutoff = (base + ChronoDuration::days(5)).timestamp_millis();
    let old: Vec<MovieDetail> = store.get_all_by_index(Collection::MoviesCache, ..cutoff).await.unwrap();
    assert_eq!(old.iter().map(|d| d.movie_id).collect::<Vec<_>>(), vec![2, 1]);

    let err = store
        .get_all_by_index::<TrackedItem, _>(Collection::Watchlist, ..)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NoIndex("watchlist")));
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = store_in(&dir);
        store.put(Collection::Settings, &SyncCheckpoint::new("profile", serde_json::json!({"id": 1}))).await.unwrap();
    }
    let store = store_in(&dir);
    let checkpoint: Option<SyncCheckpoint> = store.get(Collection::Settings, "profile").await.unwrap();
    assert_eq!(checkpoint.unwrap().value["id"], 1);
}

#[tokio::test]
async fn test_schema_version_change_drops_all_collections() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store");
    {
        let v1 = LocalStore::new(StoreOptions::new(&path).with_schema_version(1));
        v1.put(Collection::Watchlist, &item(1, ListKind::Watchlist)).await.unwrap();
        v1.put(Collection::MoviesCache, &detail(1, Utc::now())).await.unwrap();
    }

    let v2 = LocalStore::new(StoreOptions::new(&path).with_schema_version(2));
    assert!(v2.get_all::<TrackedItem>(Collection::Watchlist).await.unwrap().is_empty());
    assert!(v2.get::<MovieDetail>(Collection::MoviesCache, 1).await.unwrap().is_none());

    // Same version again: nothing is dropped
    v2.put(Collection::Watched, &item(9, ListKind::Watched)).await.unwrap();
    drop(v2);
    let again = LocalStore::new(StoreOptions::new(&path).with_schema_version(2));
    assert_eq!(again.get_all::<TrackedItem>(Collection::Watched).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_corrupted_collection_is_discarded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store");
    {
        let store = LocalStore::new(StoreOptions::new(&path));
        store.put(Collection::Watched, &item(1, ListKind::Watched)).await.unwrap();
        store.put(Collection::Likes, &item(2, ListKind::Liked)).await.unwrap();
    }
    std::fs::write(path.join("watched.json"), b"{ not json").unwrap();

    let store = LocalStore::new(StoreOptions::new(&path));
    assert!(store.get_all::<TrackedItem>(Collection::Watched).await.unwrap().is_empty());
    assert_eq!(store.get_all::<TrackedItem>(Collection::Likes).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_first_use_opens_once() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(store_in(&dir));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store.put(Collection::Watchlist, &item(i, ListKind::Watchlist)).await.unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.open_count(), 1);
    assert_eq!(store.get_all::<TrackedItem>(Collection::Watchlist).await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_reset_store_recreates_empty_store() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.put(Collection::Watchlist, &item(1, ListKind::Watchlist)).await.unwrap();
    store.put(Collection::MoviesCache, &detail(1, Utc::now())).await.unwrap();

    store.reset_store().await.unwrap();

    let counts = store.counts().await.unwrap();
    assert!(counts.iter().all(|(_, n)| *n == 0));
    assert!(store.dir().join("meta.json").exists());
    assert_eq!(store.open_count(), 2);
}

#[tokio::test]
async fn test_estimated_bytes_grows_with_records() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let empty = store.estimated_bytes().await.unwrap();
    store.put(Collection::MoviesCache, &detail(1, Utc::now())).await.unwrap();
    assert!(store.estimated_bytes().await.unwrap() > empty);
}

#[tokio::test(start_paused = true)]
async fn test_retry_blocked_backs_off_until_success() {
    let calls = Arc::new(AtomicU32::new(0));
    let started = tokio::time::Instant::now();

    let attempts = retry_blocked(10, Duration::from_millis(100), || {
        let calls = calls.clone();
        async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "in use"))
            } else {
                Ok(())
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(attempts, 4);
    // 100 + 200 + 400 ms of backoff
    assert_eq!(started.elapsed(), Duration::from_millis(700));
}

#[tokio::test(start_paused = true)]
async fn test_retry_blocked_gives_up_after_max_attempts() {
    let err = retry_blocked(3, Duration::from_millis(10), || async {
        Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "in use"))
    })
    .await
    .unwrap_err();
    assert!(matches!(err, StoreError::Blocked { attempts: 3, .. }));
}

#[tokio::test]
async fn test_retry_blocked_treats_missing_dir_as_done() {
    let attempts = retry_blocked(3, Duration::from_millis(10), || async {
        Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))
    })
    .await
    .unwrap();
    assert_eq!(attempts, 1);
}
