use anyhow::Result;
use cinetrack_models::{ListKind, MovieSummary, TrackedItem};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use crate::recommend::{Phase, RecommendationMixer, TasteProfile};
use crate::sync::SyncEngine;
use crate::view::{LoadSlot, ViewState};

/// Ratings at or above this count as a favourite for similar-movie seeding
const FAVOURITE_RATING: u8 = 8;
const MAX_SEEDS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct SwiperBatch {
    pub phase: Phase,
    pub movies: Vec<MovieSummary>,
    /// The seen set was exhausted and rebuilt from the server lists
    pub soft_reset: bool,
}

/// The swipe-to-rate feed: mixer output minus everything already seen
pub struct SwiperFeed {
    mixer: RecommendationMixer,
    engine: Arc<SyncEngine>,
    view: Arc<ViewState>,
}

impl SwiperFeed {
    pub fn new(mixer: RecommendationMixer, engine: Arc<SyncEngine>, view: Arc<ViewState>) -> Self {
        Self { mixer, engine, view }
    }

    /// Load the next batch. Returns `None` if a swiper load is already in flight.
    ///
    /// When every candidate has been seen, the seen set is reset to the
    /// server-confirmed watchlist and watched ids and the mix is retried once.
    pub async fn load_swiper_movies(&self) -> Result<Option<SwiperBatch>> {
        let Some(_guard) = self.view.try_begin_load(LoadSlot::Swiper) else {
            return Ok(None);
        };

        let taste = self.taste_profile().await?;
        let outcome = self.mixer.mix(&taste, &self.view.seen_snapshot()).await;
        if !outcome.movies.is_empty() {
            return Ok(Some(self.deliver(outcome.phase, outcome.movies, false)));
        }

        info!(
            operation = "swiper_soft_reset",
            filtered_out = outcome.filtered_out,
            "Recommendation feed exhausted, resetting seen set"
        );
        let confirmed = self.confirmed_seen_ids().await?;
        self.view.rebuild_seen(confirmed);

        let retry = self.mixer.mix(&taste, &self.view.seen_snapshot()).await;
        Ok(Some(self.deliver(retry.phase, retry.movies, true)))
    }

    fn deliver(&self, phase: Phase, movies: Vec<MovieSummary>, soft_reset: bool) -> SwiperBatch {
        self.view.mark_all_seen(movies.iter().map(|m| m.id));
        SwiperBatch {
            phase,
            movies,
            soft_reset,
        }
    }

    /// Cached list when caching is on, otherwise straight from the backend
    async fn list_items(&self, kind: ListKind) -> Result<Vec<TrackedItem>> {
        if let Some(items) = self.engine.get_list(kind).await? {
            return Ok(items);
        }
        let entries = self.engine.fetch_list(kind).await?;
        Ok(entries.iter().map(|e| TrackedItem::from_entry(e, kind)).collect())
    }

    async fn taste_profile(&self) -> Result<TasteProfile> {
        let mut watched = self.list_items(ListKind::Watched).await?;
        watched.sort_by(|a, b| b.added_at.cmp(&a.added_at));

        let liked = match self.list_items(ListKind::Liked).await {
            Ok(items) => items,
            Err(e) => {
                warn!("Liked list unavailable for seeding: {}", e);
                Vec::new()
            }
        };

        let mut favourites = Vec::new();
        let candidates = liked.iter().map(|i| i.movie_id).chain(
            watched
                .iter()
                .filter(|i| i.rating.is_some_and(|r| r >= FAVOURITE_RATING))
                .map(|i| i.movie_id),
        );
        for id in candidates {
            if !favourites.contains(&id) {
                favourites.push(id);
            }
        }
        favourites.truncate(MAX_SEEDS);

        Ok(TasteProfile {
            watched_count: watched.len(),
            recent_watched: watched.iter().take(MAX_SEEDS).map(|i| i.movie_id).collect(),
            favourites,
        })
    }

    /// Watchlist ∪ watched as the server reports them, falling back to the cache per list
    async fn confirmed_seen_ids(&self) -> Result<HashSet<u64>> {
        let mut ids = HashSet::new();
        for kind in ListKind::ALL.into_iter().filter(|k| k.counts_as_seen()) {
            match self.engine.fetch_list(kind).await {
                Ok(entries) => ids.extend(entries.iter().map(|e| e.movie_id)),
                Err(e) => {
                    warn!(list = %kind, error = %e, "Server list unavailable, using cached copy");
                    if let Some(items) = self.engine.get_list(kind).await? {
                        ids.extend(items.iter().map(|i| i.movie_id));
                    }
                }
            }
        }
        Ok(ids)
    }
}
