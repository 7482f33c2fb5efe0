//! Recommendation mixer: a weighted blend of provider listings.
//!
//! The user's watched count picks a phase, the phase picks a fixed source mix,
//! and each facet's share of the batch is fetched, pooled, deduplicated,
//! shuffled and filtered against the seen set.

use cinetrack_config::RecommendationConfig;
use cinetrack_models::{MoviePage, MovieSummary};
use cinetrack_sources::{MetadataProvider, MovieFeed, SourceError, TrendingWindow};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Deep pages sampled for the diverse facet
const DIVERSE_PAGES: std::ops::RangeInclusive<u32> = 3..=20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    ColdStart,
    Learning,
    Mature,
}

impl Phase {
    pub fn for_watched_count(watched: usize, config: &RecommendationConfig) -> Self {
        if watched <= config.cold_start_threshold {
            Phase::ColdStart
        } else if watched <= config.learning_threshold {
            Phase::Learning
        } else {
            Phase::Mature
        }
    }

    /// Source mix as percentages of the batch
    pub fn mix(&self) -> &'static [(Facet, usize)] {
        match self {
            Phase::ColdStart => &[
                (Facet::TopRated, 30),
                (Facet::Popular, 30),
                (Facet::Trending, 20),
                (Facet::Upcoming, 20),
            ],
            Phase::Learning => &[
                (Facet::Personalized, 40),
                (Facet::Popular, 20),
                (Facet::Diverse, 20),
                (Facet::Trending, 20),
            ],
            Phase::Mature => &[
                (Facet::Personalized, 50),
                (Facet::Diverse, 20),
                (Facet::Similar, 15),
                (Facet::Trending, 15),
            ],
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::ColdStart => "cold_start",
            Phase::Learning => "learning",
            Phase::Mature => "mature",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    TopRated,
    Popular,
    Trending,
    Upcoming,
    Personalized,
    Diverse,
    Similar,
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Facet::TopRated => "top_rated",
            Facet::Popular => "popular",
            Facet::Trending => "trending",
            Facet::Upcoming => "upcoming",
            Facet::Personalized => "personalized",
            Facet::Diverse => "diverse",
            Facet::Similar => "similar",
        };
        write!(f, "{}", name)
    }
}

/// Per-facet item counts for a batch, floor-rounded; zero-count facets are dropped
pub fn plan(phase: Phase, batch_size: usize) -> Vec<(Facet, usize)> {
    phase
        .mix()
        .iter()
        .map(|(facet, percent)| (*facet, batch_size * percent / 100))
        .filter(|(_, count)| *count > 0)
        .collect()
}

/// What the mixer knows about the user's taste
#[derive(Debug, Clone, Default)]
pub struct TasteProfile {
    pub watched_count: usize,
    /// Most recently watched first
    pub recent_watched: Vec<u64>,
    /// Liked or highly rated
    pub favourites: Vec<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MixOutcome {
    pub phase: Phase,
    pub plan: Vec<(Facet, usize)>,
    pub movies: Vec<MovieSummary>,
    pub failed_facets: Vec<Facet>,
    /// Candidates dropped because they were already seen
    pub filtered_out: usize,
}

pub struct RecommendationMixer {
    provider: Arc<dyn MetadataProvider>,
    config: RecommendationConfig,
    rng: Mutex<StdRng>,
}

impl RecommendationMixer {
    pub fn new(provider: Arc<dyn MetadataProvider>, config: RecommendationConfig) -> Self {
        Self::with_rng(provider, config, StdRng::from_os_rng())
    }

    /// Deterministic shuffling and deep-page sampling
    pub fn seeded(provider: Arc<dyn MetadataProvider>, config: RecommendationConfig, seed: u64) -> Self {
        Self::with_rng(provider, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(provider: Arc<dyn MetadataProvider>, config: RecommendationConfig, rng: StdRng) -> Self {
        Self {
            provider,
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    pub fn phase(&self, watched_count: usize) -> Phase {
        Phase::for_watched_count(watched_count, &self.config)
    }

    /// Build one batch of unseen candidates
    pub async fn mix(&self, taste: &TasteProfile, seen: &HashSet<u64>) -> MixOutcome {
        let phase = self.phase(taste.watched_count);
        let plan = plan(phase, self.config.batch_size);
        let diverse_pages = self.sample_diverse_pages();

        debug!(phase = %phase, plan = ?plan, "Mixing recommendation batch");

        let fetches = plan
            .iter()
            .map(|(facet, count)| self.fetch_facet(*facet, *count, taste, &diverse_pages));
        let results = join_all(fetches).await;

        let mut pool = Vec::new();
        let mut failed_facets = Vec::new();
        for ((facet, count), result) in plan.iter().zip(results) {
            match result {
                Ok(mut movies) => {
                    movies.truncate(*count);
                    debug!(facet = %facet, fetched = movies.len(), wanted = count, "Facet fetched");
                    pool.extend(movies);
                }
                Err(e) => {
                    warn!(operation = "recommend_facet", facet = %facet, error = %e, "Facet failed, skipping");
                    failed_facets.push(*facet);
                }
            }
        }

        let mut ids = HashSet::new();
        pool.retain(|movie| ids.insert(movie.id));
        if let Ok(mut rng) = self.rng.lock() {
            pool.shuffle(&mut *rng);
        }

        let before = pool.len();
        pool.retain(|movie| !seen.contains(&movie.id));
        let filtered_out = before - pool.len();

        info!(
            operation = "recommend_mix",
            phase = %phase,
            candidates = pool.len(),
            filtered_out = filtered_out,
            failed_facets = failed_facets.len(),
            "Recommendation batch ready"
        );

        MixOutcome {
            phase,
            plan,
            movies: pool,
            failed_facets,
            filtered_out,
        }
    }

    fn sample_diverse_pages(&self) -> Vec<(MovieFeed, u32)> {
        let Ok(mut rng) = self.rng.lock() else {
            return vec![(MovieFeed::TopRated, *DIVERSE_PAGES.start())];
        };
        (0..self.config.max_pages_per_facet.max(1))
            .map(|i| {
                let feed = if i % 2 == 0 { MovieFeed::TopRated } else { MovieFeed::Popular };
                (feed, rng.random_range(DIVERSE_PAGES))
            })
            .collect()
    }

    async fn fetch_facet(
        &self,
        facet: Facet,
        count: usize,
        taste: &TasteProfile,
        diverse_pages: &[(MovieFeed, u32)],
    ) -> Result<Vec<MovieSummary>, SourceError> {
        let provider = &self.provider;
        match facet {
            Facet::TopRated => self.collect_pages(count, |page| provider.movie_list(MovieFeed::TopRated, page)).await,
            Facet::Popular => self.collect_pages(count, |page| provider.movie_list(MovieFeed::Popular, page)).await,
            Facet::Upcoming => self.collect_pages(count, |page| provider.movie_list(MovieFeed::Upcoming, page)).await,
            Facet::Trending => {
                self.collect_pages(count, |page| provider.trending(TrendingWindow::Week, page))
                    .await
            }
            Facet::Personalized => {
                if taste.recent_watched.is_empty() {
                    return self.collect_pages(count, |page| provider.movie_list(MovieFeed::Popular, page)).await;
                }
                self.collect_seeded(count, &taste.recent_watched, |seed, page| provider.recommendations(seed, page))
                    .await
            }
            Facet::Similar => {
                if taste.favourites.is_empty() {
                    return self.collect_pages(count, |page| provider.movie_list(MovieFeed::Popular, page)).await;
                }
                self.collect_seeded(count, &taste.favourites, |seed, page| provider.similar(seed, page))
                    .await
            }
            Facet::Diverse => {
                let mut movies = Vec::new();
                for (feed, page) in diverse_pages {
                    movies.extend(provider.movie_list(*feed, *page).await?.results);
                    if movies.len() >= count {
                        break;
                    }
                }
                Ok(movies)
            }
        }
    }

    /// Walk pages of one listing until `count` rows or the page cap
    async fn collect_pages<F, Fut>(&self, count: usize, fetch: F) -> Result<Vec<MovieSummary>, SourceError>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<MoviePage, SourceError>>,
    {
        let mut movies = Vec::new();
        for page in 1..=self.config.max_pages_per_facet.max(1) {
            let response = fetch(page).await?;
            let has_more = response.has_more();
            movies.extend(response.results);
            if movies.len() >= count || !has_more {
                break;
            }
        }
        Ok(movies)
    }

    /// Round-robin over seed movies, page by page
    async fn collect_seeded<F, Fut>(&self, count: usize, seeds: &[u64], fetch: F) -> Result<Vec<MovieSummary>, SourceError>
    where
        F: Fn(u64, u32) -> Fut,
        Fut: Future<Output = Result<MoviePage, SourceError>>,
    {
        let mut movies = Vec::new();
        for page in 1..=self.config.max_pages_per_facet.max(1) {
            let mut any_more = false;
            for seed in seeds {
                let response = fetch(*seed, page).await?;
                any_more |= response.has_more();
                movies.extend(response.results);
                if movies.len() >= count {
                    return Ok(movies);
                }
            }
            if !any_more {
                break;
            }
        }
        Ok(movies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProvider;

    fn config() -> RecommendationConfig {
        RecommendationConfig::default()
    }

    fn stocked_provider() -> Arc<FakeProvider> {
        let provider = FakeProvider::new();
        provider.set_listing("movie/top_rated", 1..=40);
        provider.set_listing("movie/popular", 101..=140);
        provider.set_listing("trending/movie/week", 201..=240);
        provider.set_listing("movie/upcoming", 301..=340);
        provider
    }

    #[test]
    fn test_phase_thresholds() {
        let config = config();
        assert_eq!(Phase::for_watched_count(0, &config), Phase::ColdStart);
        assert_eq!(Phase::for_watched_count(5, &config), Phase::ColdStart);
        assert_eq!(Phase::for_watched_count(6, &config), Phase::Learning);
        assert_eq!(Phase::for_watched_count(15, &config), Phase::Learning);
        assert_eq!(Phase::for_watched_count(16, &config), Phase::Mature);
    }

    #[test]
    fn test_cold_start_plan_for_batch_of_fifty() {
        assert_eq!(
            plan(Phase::ColdStart, 50),
            vec![
                (Facet::TopRated, 15),
                (Facet::Popular, 15),
                (Facet::Trending, 10),
                (Facet::Upcoming, 10),
            ]
        );
    }

    #[test]
    fn test_plan_floors_fractions() {
        assert_eq!(
            plan(Phase::Mature, 50),
            vec![
                (Facet::Personalized, 25),
                (Facet::Diverse, 10),
                (Facet::Similar, 7),
                (Facet::Trending, 7),
            ]
        );
        // Tiny batches drop facets whose share rounds to zero
        assert_eq!(plan(Phase::Mature, 4), vec![(Facet::Personalized, 2)]);
    }

    #[tokio::test]
    async fn test_cold_start_mix_respects_plan_and_seen_set() {
        let provider = stocked_provider();
        let mixer = RecommendationMixer::seeded(provider.clone(), config(), 7);
        let seen: HashSet<u64> = [1, 2, 101, 201].into_iter().collect();

        let outcome = mixer.mix(&TasteProfile::default(), &seen).await;

        assert_eq!(outcome.phase, Phase::ColdStart);
        assert_eq!(outcome.movies.len(), 50 - 4);
        assert_eq!(outcome.filtered_out, 4);
        assert!(outcome.movies.iter().all(|m| !seen.contains(&m.id)));
        let top_rated = outcome.movies.iter().filter(|m| m.id <= 40).count();
        assert_eq!(top_rated, 15 - 2);
        // 20 rows per page: 15 or 10 wanted means one page per facet
        assert_eq!(provider.page_requests.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_pool_is_deduplicated() {
        let provider = FakeProvider::new();
        provider.set_listing("movie/top_rated", 1..=20);
        provider.set_listing("movie/popular", 1..=20);
        let mixer = RecommendationMixer::seeded(provider, config(), 1);

        let outcome = mixer.mix(&TasteProfile::default(), &HashSet::new()).await;
        let unique: HashSet<u64> = outcome.movies.iter().map(|m| m.id).collect();
        assert_eq!(unique.len(), outcome.movies.len());
    }

    #[tokio::test]
    async fn test_failing_facet_contributes_nothing() {
        let provider = stocked_provider();
        provider.fail_path("movie/upcoming");
        let mixer = RecommendationMixer::seeded(provider, config(), 3);

        let outcome = mixer.mix(&TasteProfile::default(), &HashSet::new()).await;
        assert_eq!(outcome.failed_facets, vec![Facet::Upcoming]);
        assert_eq!(outcome.movies.len(), 40);
        assert!(outcome.movies.iter().all(|m| !(301..=340).contains(&m.id)));
    }

    #[tokio::test]
    async fn test_seeded_facets_use_seeds_or_fall_back_to_popular() {
        let provider = stocked_provider();
        provider.set_listing("movie/9/recommendations", 501..=530);
        provider.set_listing("movie/8/similar", 601..=630);
        let mixer = RecommendationMixer::seeded(provider.clone(), config(), 11);

        let taste = TasteProfile {
            watched_count: 30,
            recent_watched: vec![9],
            favourites: vec![8],
        };
        let outcome = mixer.mix(&taste, &HashSet::new()).await;
        assert_eq!(outcome.phase, Phase::Mature);
        assert_eq!(outcome.movies.iter().filter(|m| (501..=530).contains(&m.id)).count(), 25);
        assert_eq!(outcome.movies.iter().filter(|m| (601..=630).contains(&m.id)).count(), 7);

        let paths = provider.requested_paths();
        assert!(paths.contains(&"movie/9/recommendations".to_string()));
        assert!(paths.contains(&"movie/8/similar".to_string()));

        // Learning phase without any seeds asks popular for the personalized share
        let cold_taste = TasteProfile {
            watched_count: 10,
            ..TasteProfile::default()
        };
        let before = provider.requested_paths().len();
        mixer.mix(&cold_taste, &HashSet::new()).await;
        let learning_paths = &provider.requested_paths()[before..];
        assert!(learning_paths.iter().all(|p| !p.contains("recommendations")));
        assert!(learning_paths.iter().filter(|p| *p == "movie/popular").count() >= 2);
    }

    #[tokio::test]
    async fn test_diverse_facet_reads_deep_pages() {
        let provider = stocked_provider();
        let mixer = RecommendationMixer::seeded(provider.clone(), config(), 5);

        let taste = TasteProfile {
            watched_count: 10,
            recent_watched: vec![1],
            favourites: Vec::new(),
        };
        mixer.mix(&taste, &HashSet::new()).await;

        let requests = provider.page_requests.lock().unwrap().clone();
        assert!(requests
            .iter()
            .any(|(path, page)| path == "movie/top_rated" && DIVERSE_PAGES.contains(page)));
    }

    #[tokio::test]
    async fn test_same_seed_same_order() {
        let a = RecommendationMixer::seeded(stocked_provider(), config(), 42);
        let b = RecommendationMixer::seeded(stocked_provider(), config(), 42);
        let seen = HashSet::new();

        let ids_a: Vec<u64> = a.mix(&TasteProfile::default(), &seen).await.movies.iter().map(|m| m.id).collect();
        let ids_b: Vec<u64> = b.mix(&TasteProfile::default(), &seen).await.movies.iter().map(|m| m.id).collect();
        assert_eq!(ids_a, ids_b);
    }
}
