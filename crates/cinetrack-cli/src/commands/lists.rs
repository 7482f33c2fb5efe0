use crate::commands::{describe_error, AppContext};
use crate::output::{new_table, Output};
use cinetrack_models::{ListKind, TrackedItem};
use color_eyre::eyre::eyre;
use color_eyre::Result;

pub struct ListArgs {
    pub page: u32,
    pub page_size: usize,
    pub all: bool,
    pub live: bool,
}

pub async fn run_list(kind: ListKind, args: ListArgs, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    ctx.view.set_page(kind, args.page);

    let mut pages = Vec::new();
    loop {
        let Some(page) = ctx
            .engine
            .load_list_page(kind, args.page_size, args.live)
            .await
            .map_err(|e| eyre!("Failed to load {}: {}", kind, describe_error(&e)))?
        else {
            return Err(eyre!("{} is already being loaded", kind));
        };
        let done = !args.all || page.items.is_empty() || page.page >= page.total_pages;
        pages.push(page);
        if done {
            break;
        }
    }

    let Some(first) = pages.first() else {
        return Ok(());
    };
    let source = if first.from_cache { "cache" } else { "backend" };
    let (total_items, total_pages, last_page) = (
        first.total_items,
        first.total_pages,
        pages.last().map(|p| p.page).unwrap_or(first.page),
    );
    let items: Vec<TrackedItem> = pages.into_iter().flat_map(|p| p.items).collect();

    let payload = serde_json::json!({
        "list": kind,
        "first_page": args.page.max(1),
        "last_page": last_page,
        "total_pages": total_pages,
        "total_items": total_items,
        "source": source,
        "items": items,
    });
    output.data(&payload, || {
        print_items(kind, &items, total_items, source, output);
        if total_pages > 1 {
            output.info(format!("Page {} of {}", last_page, total_pages));
        }
    });
    Ok(())
}

fn print_items(kind: ListKind, items: &[TrackedItem], total: usize, source: &str, output: &Output) {
    if total == 0 {
        output.info(format!("Your {} is empty", kind));
        return;
    }
    if items.is_empty() {
        output.info(format!("No more movies in {}", kind));
        return;
    }

    let mut table = new_table(&["ID", "Title", "Year", "Rating", "Added"]);
    for item in items {
        let year = item
            .cached_detail
            .as_ref()
            .and_then(|d| d.year())
            .map(|y| y.to_string())
            .unwrap_or_default();
        table.add_row(vec![
            item.movie_id.to_string(),
            item.title().unwrap_or("-").to_string(),
            year,
            item.rating.map(|r| format!("{}/10", r)).unwrap_or_default(),
            item.added_at.format("%Y-%m-%d").to_string(),
        ]);
    }
    output.table(&table);
    output.info(format!("{} of {} movies in {} (from {})", items.len(), total, kind, source));
}

pub async fn run_track(kind: ListKind, movie_id: u64, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let item = ctx
        .engine
        .track(kind, movie_id)
        .await
        .map_err(|e| eyre!("Failed to add movie {} to {}: {}", movie_id, kind, describe_error(&e)))?;

    output.data(&item, || {
        output.success(format!("Added {} to {}", display_name(&item), kind));
    });
    Ok(())
}

pub async fn run_untrack(kind: ListKind, movie_id: u64, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let removed_locally = ctx
        .engine
        .untrack(kind, movie_id)
        .await
        .map_err(|e| eyre!("Failed to remove movie {} from {}: {}", movie_id, kind, describe_error(&e)))?;

    let payload = serde_json::json!({
        "movie_id": movie_id,
        "list": kind,
        "removed_locally": removed_locally,
    });
    output.data(&payload, || {
        output.success(format!("Removed movie {} from {}", movie_id, kind));
    });
    Ok(())
}

pub async fn run_rate(movie_id: u64, rating: u8, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let item = ctx
        .engine
        .rate(movie_id, rating)
        .await
        .map_err(|e| eyre!("Failed to rate movie {}: {}", movie_id, describe_error(&e)))?;

    output.data(&item, || {
        output.success(format!("Rated {} {}/10", display_name(&item), rating));
    });
    Ok(())
}

fn display_name(item: &TrackedItem) -> String {
    item.title()
        .map(|t| format!("'{}'", t))
        .unwrap_or_else(|| format!("movie {}", item.movie_id))
}
