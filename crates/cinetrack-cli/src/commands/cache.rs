use crate::commands::AppContext;
use crate::output::Output;
use crate::CacheCommands;
use color_eyre::eyre::eyre;
use color_eyre::Result;

pub async fn run_cache(cmd: CacheCommands, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let enabled = matches!(cmd, CacheCommands::Enable);

    ctx.engine
        .set_enabled(enabled)
        .await
        .map_err(|e| eyre!("Failed to update cache preference: {}", e))?;

    if enabled {
        output.success("Local cache enabled. Run 'cinetrack sync' to populate it.");
    } else {
        output.success("Local cache disabled. Cached data is kept but no longer refreshed.");
    }
    Ok(())
}
