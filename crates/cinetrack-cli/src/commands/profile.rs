use crate::commands::prompts::{prompt_new_password, prompt_password};
use crate::commands::{describe_error, AppContext};
use crate::output::{new_table, Output};
use crate::ProfileCommands;
use cinetrack_models::{UserProfile, UserStats};
use cinetrack_sources::{LikeCount, SourceError, TrackerBackend};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::Serialize;
use tracing::info;

#[derive(Serialize)]
struct ProfileView {
    profile: UserProfile,
    stats: Option<UserStats>,
}

pub async fn run_profile(cmd: ProfileCommands, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    match cmd {
        ProfileCommands::Show => show_profile(&ctx, output).await,
        ProfileCommands::SetUsername { username } => {
            ctx.backend
                .update_username(&username)
                .await
                .map_err(|e| backend_error("update username", e))?;
            info!(operation = "profile_update", field = "username", "Profile updated");
            output.success(format!("Username changed to {}", username.trim()));
            Ok(())
        }
        ProfileCommands::SetAvatar { avatar } => {
            ctx.backend
                .update_avatar(&avatar)
                .await
                .map_err(|e| backend_error("update avatar", e))?;
            info!(operation = "profile_update", field = "avatar", "Profile updated");
            output.success("Avatar updated");
            Ok(())
        }
        ProfileCommands::SetPrivacy { privacy } => {
            ctx.backend
                .update_privacy(privacy)
                .await
                .map_err(|e| backend_error("update privacy", e))?;
            info!(operation = "profile_update", field = "privacy", "Profile updated");
            output.success(format!("Profile visibility set to {}", privacy));
            Ok(())
        }
        ProfileCommands::SetPassword => {
            let current = prompt_password("Current password")?;
            let new = prompt_new_password("New password")?;
            if new.is_empty() {
                return Err(eyre!("New password cannot be empty"));
            }
            ctx.backend
                .update_password(&current, &new)
                .await
                .map_err(|e| backend_error("change password", e))?;
            info!(operation = "profile_update", field = "password", "Profile updated");
            output.success("Password changed");
            Ok(())
        }
    }
}

async fn show_profile(ctx: &AppContext, output: &Output) -> Result<()> {
    let (profile, stats) = tokio::join!(ctx.backend.get_profile(), ctx.backend.stats());
    let profile = profile.map_err(|e| backend_error("load profile", e))?;
    let stats = match stats {
        Ok(stats) => Some(stats),
        Err(e) if e.is_auth() => return Err(backend_error("load stats", e)),
        Err(e) => {
            output.warn(format!("Stats unavailable: {}", e));
            None
        }
    };

    let view = ProfileView { profile, stats };
    output.data(&view, || {
        let profile = &view.profile;
        let mut table = new_table(&["Field", "Value"]);
        table.add_row(vec!["Username".to_string(), profile.username.clone()]);
        table.add_row(vec!["Email".to_string(), profile.email.clone().unwrap_or_default()]);
        table.add_row(vec![
            "Privacy".to_string(),
            profile.privacy.map(|p| p.to_string()).unwrap_or_default(),
        ]);
        if let Some(created) = profile.created_at {
            table.add_row(vec!["Member since".to_string(), created.format("%Y-%m-%d").to_string()]);
        }
        if let Some(stats) = &view.stats {
            table.add_row(vec!["Watched".to_string(), stats.watched_count.to_string()]);
            table.add_row(vec!["Watchlist".to_string(), stats.watchlist_count.to_string()]);
            table.add_row(vec!["Liked".to_string(), stats.liked_count.to_string()]);
            if let Some(avg) = stats.average_rating {
                table.add_row(vec!["Average rating".to_string(), format!("{:.1}/10", avg)]);
            }
            if let Some(minutes) = stats.total_runtime_minutes {
                table.add_row(vec!["Time watched".to_string(), format_runtime(minutes)]);
            }
        }
        output.table(&table);
    });
    Ok(())
}

/// Most-liked movies across every user of the backend
pub async fn run_top_liked(limit: usize, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let likes = ctx
        .backend
        .all_likes()
        .await
        .map_err(|e| backend_error("load likes", e))?;
    let ranked = rank_likes(likes, limit);

    output.data(&ranked, || {
        if ranked.is_empty() {
            output.info("Nobody has liked a movie yet");
            return;
        }
        let mut table = new_table(&["#", "Movie ID", "Likes"]);
        for (i, like) in ranked.iter().enumerate() {
            table.add_row(vec![(i + 1).to_string(), like.movie_id.to_string(), like.count.to_string()]);
        }
        output.table(&table);
    });
    Ok(())
}

fn rank_likes(mut likes: Vec<LikeCount>, limit: usize) -> Vec<LikeCount> {
    likes.sort_by(|a, b| b.count.cmp(&a.count).then(a.movie_id.cmp(&b.movie_id)));
    likes.truncate(limit);
    likes
}

fn format_runtime(minutes: u64) -> String {
    let (days, hours, mins) = (minutes / 1440, (minutes % 1440) / 60, minutes % 60);
    match (days, hours) {
        (0, 0) => format!("{}m", mins),
        (0, _) => format!("{}h {}m", hours, mins),
        _ => format!("{}d {}h {}m", days, hours, mins),
    }
}

pub(crate) fn backend_error(action: &str, e: SourceError) -> color_eyre::Report {
    eyre!("Failed to {}: {}", action, describe_error(&e.into()))
}
