use crate::commands::{describe_error, AppContext};
use crate::output::{new_table, Output};
use cinetrack_core::{RecommendationMixer, SwiperFeed};
use cinetrack_models::{ListKind, MovieSummary};
use cinetrack_sources::MetadataProvider;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing::warn;

pub async fn run_recommend(limit: usize, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    seed_seen_set(&ctx).await?;

    let mixer = RecommendationMixer::new(ctx.provider.clone(), ctx.config.recommendations.clone());
    let feed = SwiperFeed::new(mixer, ctx.engine.clone(), ctx.view.clone());

    let Some(mut batch) = feed
        .load_swiper_movies()
        .await
        .map_err(|e| eyre!("Failed to load recommendations: {}", describe_error(&e)))?
    else {
        return Err(eyre!("A recommendation load is already in progress"));
    };
    batch.movies.truncate(limit);

    output.data(&batch, || {
        if batch.soft_reset {
            output.warn("You've seen every candidate; starting over from your watchlist and watched movies");
        }
        if batch.movies.is_empty() {
            output.info("No recommendations available right now");
            return;
        }
        output.info(format!("Recommendations ({} phase)", batch.phase));
        print_movies(&batch.movies, output);
    });
    Ok(())
}

/// Seen set for a fresh process: the cached lists, or the backend's when caching is off
async fn seed_seen_set(ctx: &AppContext) -> Result<()> {
    let mut ids = Vec::new();
    for kind in ListKind::ALL.into_iter().filter(|k| k.counts_as_seen()) {
        match ctx.engine.get_list(kind).await {
            Ok(Some(items)) => ids.extend(items.iter().map(|i| i.movie_id)),
            Ok(None) => match ctx.engine.fetch_list(kind).await {
                Ok(entries) => ids.extend(entries.iter().map(|e| e.movie_id)),
                Err(e) => warn!(list = %kind, error = %e, "Could not load list for the seen set"),
            },
            Err(e) => return Err(eyre!("Failed to read cached {}: {}", kind, e)),
        }
    }
    ctx.view.rebuild_seen(ids);
    Ok(())
}

pub async fn run_search(query: &str, page: u32, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let results = ctx
        .provider
        .search(query, page)
        .await
        .map_err(|e| eyre!("Search failed: {}", e))?;

    output.data(&results, || {
        if results.results.is_empty() {
            output.info(format!("No movies found for '{}'", query));
            return;
        }
        print_movies(&results.results, output);
        output.info(format!("Page {} of {}", results.page, results.total_pages));
    });
    Ok(())
}

pub(crate) fn print_movies(movies: &[MovieSummary], output: &Output) {
    let mut table = new_table(&["ID", "Title", "Released", "Score"]);
    for movie in movies {
        table.add_row(vec![
            movie.id.to_string(),
            movie.title.clone(),
            movie.release_date.clone().unwrap_or_default(),
            format!("{:.1}", movie.vote_average),
        ]);
    }
    output.table(&table);
}
