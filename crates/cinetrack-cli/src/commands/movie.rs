use crate::commands::recommend::print_movies;
use crate::commands::{describe_error, AppContext};
use crate::output::{new_table, Output};
use cinetrack_models::{CastMember, MovieDetail, Video};
use cinetrack_sources::MetadataProvider;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::Serialize;
use tracing::warn;

const TOP_CAST: usize = 5;

#[derive(Serialize)]
struct MovieOverview {
    detail: MovieDetail,
    directors: Vec<String>,
    cast: Vec<CastMember>,
    trailer: Option<String>,
}

/// Cached detail plus credits and trailer from the provider
pub async fn run_movie(movie_id: u64, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let (detail, credits, videos) = tokio::join!(
        ctx.engine.movie_detail(movie_id),
        ctx.provider.credits(movie_id),
        ctx.provider.videos(movie_id),
    );

    let detail = detail
        .map_err(|e| eyre!("Failed to load movie {}: {}", movie_id, describe_error(&e)))?
        .ok_or_else(|| eyre!("Movie {} not found", movie_id))?;

    let (directors, cast): (Vec<String>, Vec<CastMember>) = match credits {
        Ok(credits) => (
            credits.directors().map(|c| c.name.clone()).collect(),
            credits.cast.into_iter().take(TOP_CAST).collect(),
        ),
        Err(e) => {
            warn!(movie_id, error = %e, "Credits unavailable");
            (Vec::new(), Vec::new())
        }
    };
    let trailer = match videos {
        Ok(videos) => trailer_url(&videos),
        Err(e) => {
            warn!(movie_id, error = %e, "Videos unavailable");
            None
        }
    };

    let overview = MovieOverview {
        detail,
        directors,
        cast,
        trailer,
    };
    output.data(&overview, || {
        let detail = &overview.detail;
        let mut table = new_table(&["Field", "Value"]);
        table.add_row(vec!["Title".to_string(), detail.title.clone()]);
        table.add_row(vec![
            "Year".to_string(),
            detail.year().map(|y| y.to_string()).unwrap_or_default(),
        ]);
        table.add_row(vec![
            "Genres".to_string(),
            detail.genres.iter().map(|g| g.name.clone()).collect::<Vec<_>>().join(", "),
        ]);
        table.add_row(vec!["Score".to_string(), format!("{:.1}", detail.vote_average)]);
        if let Some(runtime) = detail.runtime {
            table.add_row(vec!["Runtime".to_string(), format!("{} min", runtime)]);
        }
        if !overview.directors.is_empty() {
            table.add_row(vec!["Directed by".to_string(), overview.directors.join(", ")]);
        }
        if !overview.cast.is_empty() {
            let names: Vec<String> = overview
                .cast
                .iter()
                .map(|c| match &c.character {
                    Some(role) if !role.is_empty() => format!("{} ({})", c.name, role),
                    _ => c.name.clone(),
                })
                .collect();
            table.add_row(vec!["Starring".to_string(), names.join(", ")]);
        }
        if let Some(url) = &overview.trailer {
            table.add_row(vec!["Trailer".to_string(), url.clone()]);
        }
        output.table(&table);
    });
    Ok(())
}

pub async fn run_collection(collection_id: u64, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let collection = ctx
        .provider
        .collection(collection_id)
        .await
        .map_err(|e| eyre!("Failed to load collection {}: {}", collection_id, e))?;

    output.data(&collection, || {
        output.info(&collection.name);
        if let Some(overview) = collection.overview.as_deref().filter(|o| !o.is_empty()) {
            output.info(overview);
        }
        print_movies(&collection.parts, output);
    });
    Ok(())
}

/// Official YouTube trailer first, then any YouTube trailer
fn trailer_url(videos: &[Video]) -> Option<String> {
    let trailers = || videos.iter().filter(|v| v.is_youtube_trailer());
    trailers()
        .find(|v| v.official)
        .or_else(|| trailers().next())
        .map(|v| format!("https://www.youtube.com/watch?v={}", v.key))
}
