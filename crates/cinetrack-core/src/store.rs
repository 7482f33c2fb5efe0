//! Local record store: named collections, each a JSON document keyed by one field.
//!
//! The store is a cache of backend state and is never authoritative. Every
//! collection lives in `<dir>/<name>.json` and is rewritten atomically (temp
//! file + rename) on each mutation. `meta.json` records the schema version; a
//! version change drops every collection on the next open.

use chrono::{DateTime, Utc};
use cinetrack_config::CacheConfig;
use cinetrack_models::ListKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::ops::RangeBounds;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub const DEFAULT_SCHEMA_VERSION: u32 = 1;

const META_FILE: &str = "meta.json";
const MAX_RESET_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Watchlist,
    Watched,
    Likes,
    MoviesCache,
    Settings,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Watchlist,
        Collection::Watched,
        Collection::Likes,
        Collection::MoviesCache,
        Collection::Settings,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Watchlist => "watchlist",
            Collection::Watched => "watched",
            Collection::Likes => "likes",
            Collection::MoviesCache => "movies_cache",
            Collection::Settings => "settings",
        }
    }

    /// Primary key field
    pub fn key_field(&self) -> &'static str {
        match self {
            Collection::Settings => "key",
            _ => "movie_id",
        }
    }

    /// Secondary index field, if any. Indexed values are integers.
    pub fn index_field(&self) -> Option<&'static str> {
        match self {
            Collection::MoviesCache => Some("cached_at"),
            _ => None,
        }
    }

    pub fn for_list(kind: ListKind) -> Self {
        match kind {
            ListKind::Watchlist => Collection::Watchlist,
            ListKind::Watched => Collection::Watched,
            ListKind::Liked => Collection::Likes,
        }
    }

    fn file_name(&self) -> String {
        format!("{}.json", self.name())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record for '{collection}' has no usable '{field}' key")]
    MissingKey { collection: &'static str, field: &'static str },

    #[error("Collection '{0}' has no secondary index")]
    NoIndex(&'static str),

    #[error("Store deletion still blocked after {attempts} attempts: {message}")]
    Blocked { attempts: u32, message: String },
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub dir: PathBuf,
    pub schema_version: u32,
    pub reset_max_attempts: u32,
    pub reset_base_delay: Duration,
}

impl StoreOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            schema_version: DEFAULT_SCHEMA_VERSION,
            reset_max_attempts: 10,
            reset_base_delay: Duration::from_millis(100),
        }
    }

    pub fn from_config(dir: impl Into<PathBuf>, config: &CacheConfig) -> Self {
        Self::new(dir)
            .with_schema_version(config.schema_version)
            .with_reset_policy(config.reset_max_attempts, Duration::from_millis(config.reset_base_delay_ms))
    }

    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    pub fn with_reset_policy(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.reset_max_attempts = max_attempts.max(1);
        self.reset_base_delay = base_delay;
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreMeta {
    schema_version: u32,
    created_at: DateTime<Utc>,
}

/// Records of one collection in insertion order, with a key → position map
#[derive(Debug, Default)]
struct CollectionData {
    records: Vec<(String, Value)>,
    positions: HashMap<String, usize>,
}

impl CollectionData {
    fn upsert(&mut self, key: String, value: Value) {
        match self.positions.get(&key) {
            Some(&pos) => self.records[pos].1 = value,
            None => {
                self.positions.insert(key.clone(), self.records.len());
                self.records.push((key, value));
            }
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        let Some(pos) = self.positions.remove(key) else {
            return false;
        };
        self.records.remove(pos);
        for (k, _) in &self.records[pos..] {
            if let Some(p) = self.positions.get_mut(k) {
                *p -= 1;
            }
        }
        true
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.positions.get(key).map(|&pos| &self.records[pos].1)
    }

    fn clear(&mut self) {
        self.records.clear();
        self.positions.clear();
    }
}

#[derive(Debug, Default)]
struct StoreState {
    collections: HashMap<Collection, CollectionData>,
}

impl StoreState {
    fn collection(&mut self, collection: Collection) -> &mut CollectionData {
        self.collections.entry(collection).or_default()
    }
}

pub struct LocalStore {
    options: StoreOptions,
    state: Mutex<Option<StoreState>>,
    opens: AtomicU32,
}

impl LocalStore {
    /// Create a handle. Nothing touches disk until the first operation.
    pub fn new(options: StoreOptions) -> Self {
        Self {
            options,
            state: Mutex::new(None),
            opens: AtomicU32::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.options.dir
    }

    pub fn schema_version(&self) -> u32 {
        self.options.schema_version
    }

    /// How many times the store has been opened from disk (initial open plus resets)
    pub fn open_count(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Lock the state, opening the store first if needed.
    ///
    /// Concurrent first callers queue on the mutex, so exactly one of them
    /// performs the open and the rest observe the initialized state.
    async fn open(&self) -> Result<MutexGuard<'_, Option<StoreState>>, StoreError> {
        let mut guard = self.state.lock().await;
        if guard.is_none() {
            *guard = Some(self.load_from_disk().await?);
            self.opens.fetch_add(1, Ordering::SeqCst);
        }
        Ok(guard)
    }

    async fn load_from_disk(&self) -> Result<StoreState, StoreError> {
        let dir = &self.options.dir;
        tokio::fs::create_dir_all(dir).await?;

        let meta_path = dir.join(META_FILE);
        let stored_version = match tokio::fs::read(&meta_path).await {
            Ok(bytes) => match serde_json::from_slice::<StoreMeta>(&bytes) {
                Ok(meta) => Some(meta.schema_version),
                Err(e) => {
                    warn!("Store metadata unreadable ({}), treating store as unversioned", e);
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        if stored_version != Some(self.options.schema_version) {
            // No migrations: any version change drops every collection
            if let Some(old) = stored_version {
                warn!(
                    operation = "store_schema_upgrade",
                    from = old,
                    to = self.options.schema_version,
                    "Schema version changed, dropping all local collections"
                );
            }
            for collection in Collection::ALL {
                remove_if_exists(&dir.join(collection.file_name())).await?;
            }
            let meta = StoreMeta {
                schema_version: self.options.schema_version,
                created_at: Utc::now(),
            };
            write_atomic(&meta_path, &serde_json::to_vec_pretty(&meta)?).await?;
        }

        let mut state = StoreState::default();
        for collection in Collection::ALL {
            let data = self.load_collection(collection).await?;
            state.collections.insert(collection, data);
        }

        info!(
            operation = "store_open",
            dir = %dir.display(),
            schema_version = self.options.schema_version,
            "Local store opened"
        );
        Ok(state)
    }

    async fn load_collection(&self, collection: Collection) -> Result<CollectionData, StoreError> {
        let path = self.options.dir.join(collection.file_name());
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CollectionData::default()),
            Err(e) => return Err(e.into()),
        };

        let records: Vec<Value> = match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    "Store corruption detected for {}: {}. Deleting corrupted file.",
                    collection.name(),
                    e
                );
                remove_if_exists(&path).await?;
                return Ok(CollectionData::default());
            }
        };

        let mut data = CollectionData::default();
        for record in records {
            match record_key(collection, &record) {
                Ok(key) => data.upsert(key, record),
                Err(e) => warn!("Skipping stored record in {}: {}", collection.name(), e),
            }
        }
        debug!("Loaded {} records from {}", data.records.len(), collection.name());
        Ok(data)
    }

    async fn persist(&self, state: &StoreState, collection: Collection) -> Result<(), StoreError> {
        let records: Vec<&Value> = state
            .collections
            .get(&collection)
            .map(|data| data.records.iter().map(|(_, v)| v).collect())
            .unwrap_or_default();
        let bytes = serde_json::to_vec_pretty(&records)?;
        write_atomic(&self.options.dir.join(collection.file_name()), &bytes).await
    }

    /// Upsert by primary key and return the stored key
    pub async fn put<T: Serialize>(&self, collection: Collection, record: &T) -> Result<String, StoreError> {
        let value = serde_json::to_value(record)?;
        let key = record_key(collection, &value)?;

        let mut guard = self.open().await?;
        let state = guard.get_or_insert_with(StoreState::default);
        state.collection(collection).upsert(key.clone(), value);
        self.persist(state, collection).await?;
        Ok(key)
    }

    /// Upsert several records with a single write
    pub async fn put_many<T: Serialize>(&self, collection: Collection, records: &[T]) -> Result<usize, StoreError> {
        let mut keyed = Vec::with_capacity(records.len());
        for record in records {
            let value = serde_json::to_value(record)?;
            keyed.push((record_key(collection, &value)?, value));
        }
        if keyed.is_empty() {
            return Ok(0);
        }

        let mut guard = self.open().await?;
        let state = guard.get_or_insert_with(StoreState::default);
        let data = state.collection(collection);
        for (key, value) in keyed {
            data.upsert(key, value);
        }
        self.persist(state, collection).await?;
        Ok(records.len())
    }

    /// Fetch one record; a missing key is `Ok(None)`
    pub async fn get<T: DeserializeOwned>(&self, collection: Collection, key: impl ToString) -> Result<Option<T>, StoreError> {
        let key = key.to_string();
        let mut guard = self.open().await?;
        let state = guard.get_or_insert_with(StoreState::default);
        match state.collection(collection).get(&key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// All records in store order (insertion order; upserts keep their slot)
    pub async fn get_all<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, StoreError> {
        let mut guard = self.open().await?;
        let state = guard.get_or_insert_with(StoreState::default);
        state
            .collection(collection)
            .records
            .iter()
            .map(|(_, v)| serde_json::from_value(v.clone()).map_err(StoreError::from))
            .collect()
    }

    /// Records whose secondary-index value lies in `range`, ordered by that value
    pub async fn get_all_by_index<T, R>(&self, collection: Collection, range: R) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned,
        R: RangeBounds<i64>,
    {
        let field = collection.index_field().ok_or(StoreError::NoIndex(collection.name()))?;
        let mut guard = self.open().await?;
        let state = guard.get_or_insert_with(StoreState::default);

        let mut hits: Vec<(i64, &Value)> = state
            .collection(collection)
            .records
            .iter()
            .filter_map(|(_, v)| v.get(field).and_then(Value::as_i64).map(|idx| (idx, v)))
            .filter(|(idx, _)| range.contains(idx))
            .collect();
        hits.sort_by_key(|(idx, _)| *idx);

        hits.into_iter()
            .map(|(_, v)| serde_json::from_value(v.clone()).map_err(StoreError::from))
            .collect()
    }

    /// Remove one record; returns whether it existed
    pub async fn delete(&self, collection: Collection, key: impl ToString) -> Result<bool, StoreError> {
        let key = key.to_string();
        let mut guard = self.open().await?;
        let state = guard.get_or_insert_with(StoreState::default);
        let removed = state.collection(collection).remove(&key);
        if removed {
            self.persist(state, collection).await?;
        }
        Ok(removed)
    }

    /// Remove every record of a collection. Idempotent.
    pub async fn clear(&self, collection: Collection) -> Result<(), StoreError> {
        let mut guard = self.open().await?;
        let state = guard.get_or_insert_with(StoreState::default);
        state.collection(collection).clear();
        self.persist(state, collection).await
    }

    /// Clear-and-replace in one write. Keys are validated before anything is touched,
    /// so a bad record leaves the previous contents intact.
    pub async fn replace_all<T: Serialize>(&self, collection: Collection, records: &[T]) -> Result<usize, StoreError> {
        let mut fresh = CollectionData::default();
        for record in records {
            let value = serde_json::to_value(record)?;
            fresh.upsert(record_key(collection, &value)?, value);
        }
        let count = fresh.records.len();

        let mut guard = self.open().await?;
        let state = guard.get_or_insert_with(StoreState::default);
        state.collections.insert(collection, fresh);
        self.persist(state, collection).await?;
        Ok(count)
    }

    /// Record count per collection
    pub async fn counts(&self) -> Result<Vec<(Collection, usize)>, StoreError> {
        let mut guard = self.open().await?;
        let state = guard.get_or_insert_with(StoreState::default);
        Ok(Collection::ALL
            .iter()
            .map(|c| (*c, state.collection(*c).records.len()))
            .collect())
    }

    /// Bytes used on disk by the store's files
    pub async fn estimated_bytes(&self) -> Result<u64, StoreError> {
        let _guard = self.open().await?;
        let mut total = 0;
        let mut entries = tokio::fs::read_dir(&self.options.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                total += metadata.len();
            }
        }
        Ok(total)
    }

    /// Destroy and recreate the whole store.
    ///
    /// Deletion is retried with exponential backoff while the file system
    /// reports the directory as busy.
    pub async fn reset_store(&self) -> Result<(), StoreError> {
        let mut guard = self.state.lock().await;
        *guard = None;

        let dir = self.options.dir.clone();
        let attempts = retry_blocked(self.options.reset_max_attempts, self.options.reset_base_delay, || {
            let dir = dir.clone();
            async move { tokio::fs::remove_dir_all(&dir).await }
        })
        .await?;

        *guard = Some(self.load_from_disk().await?);
        self.opens.fetch_add(1, Ordering::SeqCst);
        info!(operation = "store_reset", attempts = attempts, "Local store destroyed and recreated");
        Ok(())
    }
}

/// Run `op` until it succeeds (a missing target counts as success), sleeping
/// `base_delay * 2^n` between attempts. Returns the number of attempts used.
pub(crate) async fn retry_blocked<F, Fut>(max_attempts: u32, base_delay: Duration, mut op: F) -> Result<u32, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    let max_attempts = max_attempts.max(1);
    let mut delay = base_delay;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(()) => return Ok(attempt),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(attempt),
            Err(e) if attempt >= max_attempts => {
                return Err(StoreError::Blocked {
                    attempts: attempt,
                    message: e.to_string(),
                })
            }
            Err(e) => {
                warn!(
                    operation = "store_reset_blocked",
                    attempt = attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Store deletion blocked, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_RESET_DELAY);
            }
        }
    }
}

fn record_key(collection: Collection, value: &Value) -> Result<String, StoreError> {
    let field = collection.key_field();
    match value.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(StoreError::MissingKey {
            collection: collection.name(),
            field,
        }),
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, bytes).await?;
    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests;
