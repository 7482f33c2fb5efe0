use cinetrack_models::{ListKind, PrivacySetting};
use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::eyre;
use commands::{cache, clear, config, daemon, friends, lists, movie, profile, recommend, session, sync};

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "cinetrack")]
#[command(about = "cinetrack - track what you watch, offline-first")]
#[command(version)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror the backend lists into the local cache
    #[command(long_about = "Run one sync round: fetch profile, watchlist, watched and liked lists from the backend, refresh movie details older than the cache max age, and replace the local copies.")]
    Sync,

    /// Show a cached list (works offline)
    List {
        /// watchlist, watched or liked
        kind: ListKind,

        /// Fetch from the backend even when a cached copy exists
        #[arg(long, action = ArgAction::SetTrue)]
        live: bool,

        /// Page to start from
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Movies per page
        #[arg(long, default_value_t = 20)]
        page_size: usize,

        /// Keep loading pages until the list is exhausted
        #[arg(long, action = ArgAction::SetTrue)]
        all: bool,
    },

    /// Local cache health: record counts, size, stale details, last sync
    Status,

    /// Delete and recreate the local cache
    Reset {
        /// Skip the confirmation prompt
        #[arg(long, action = ArgAction::SetTrue)]
        yes: bool,
    },

    /// Turn the local cache on or off
    Cache {
        #[command(subcommand)]
        cmd: CacheCommands,
    },

    /// Store a backend session token
    #[command(long_about = "Store the backend session token used for all per-user calls. Without --token the token is read from a hidden prompt. The token is verified against /profile before it is saved.")]
    Login {
        #[arg(long)]
        token: Option<String>,
    },

    /// Forget the stored session token
    Logout,

    /// Next batch of swiper recommendations
    Recommend {
        /// Show at most this many movies
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Add a movie to a list
    Track { kind: ListKind, movie_id: u64 },

    /// Remove a movie from a list
    Untrack { kind: ListKind, movie_id: u64 },

    /// Rate a movie from 1 to 10 (marks it watched)
    Rate {
        movie_id: u64,
        #[arg(value_parser = clap::value_parser!(u8).range(1..=10))]
        rating: u8,
    },

    /// Search the metadata provider
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Cached details, credits and trailer for one movie
    Movie { movie_id: u64 },

    /// Every movie in a provider collection
    Collection { collection_id: u64 },

    /// Movies most liked across all users
    TopLiked {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show or edit your backend profile
    Profile {
        #[command(subcommand)]
        cmd: ProfileCommands,
    },

    /// Friends, friend requests and user search
    Friends {
        #[command(subcommand)]
        cmd: FriendsCommands,
    },

    /// Run in the foreground, syncing on startup, on an interval and on reconnect
    #[command(long_about = "Run the sync scheduler: one sync on startup (unless --no-startup-sync), one every scheduler.interval_minutes while online, and one after connectivity returns (debounced). Connectivity is detected by probing the backend. Logs go to a daily-rotating file.")]
    Daemon {
        /// Skip initial sync on startup
        #[arg(long, action = ArgAction::SetTrue)]
        no_startup_sync: bool,
    },

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },

    /// Clear local data
    #[command(long_about = "Clear local data. Use --cache to delete the local store, --credentials to remove the credentials file, --timestamps to forget the last sync time, or --all for everything.")]
    Clear {
        /// Clear cache, credentials and timestamps
        #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["cache", "credentials", "timestamps"])]
        all: bool,

        #[arg(long, action = ArgAction::SetTrue)]
        cache: bool,

        #[arg(long, action = ArgAction::SetTrue)]
        credentials: bool,

        #[arg(long, action = ArgAction::SetTrue)]
        timestamps: bool,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    Enable,
    Disable,
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Profile and watch statistics
    Show,
    SetUsername { username: String },
    /// Avatar URL or identifier
    SetAvatar { avatar: String },
    /// public, friends-only or private
    SetPrivacy { privacy: PrivacySetting },
    /// Change your password (prompted)
    SetPassword,
}

#[derive(Subcommand)]
pub enum FriendsCommands {
    List,
    /// Pending incoming requests
    Requests,
    Search { query: String },
    /// Send a friend request
    Add { username: String },
    Accept { request_id: u64 },
    Remove { friend_id: u64 },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (API key masked)
    Show {
        /// Include the API key
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },
    /// Write a starter config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let output = output::Output::new(cli.output, cli.quiet);

    // The daemon logs to a file; everything else to stderr
    if !matches!(cli.command, Commands::Daemon { .. }) {
        logging::init_logging(cli.verbose, cli.quiet).map_err(|e| eyre!("{}", e))?;
    }

    match cli.command {
        Commands::Sync => sync::run_sync(&output).await,
        Commands::List {
            kind,
            live,
            page,
            page_size,
            all,
        } => {
            let args = lists::ListArgs {
                page,
                page_size,
                all,
                live,
            };
            lists::run_list(kind, args, &output).await
        }
        Commands::Status => sync::run_status(&output).await,
        Commands::Reset { yes } => sync::run_reset(yes, &output).await,
        Commands::Cache { cmd } => cache::run_cache(cmd, &output).await,
        Commands::Login { token } => session::run_login(token, &output).await,
        Commands::Logout => session::run_logout(&output).await,
        Commands::Recommend { limit } => recommend::run_recommend(limit, &output).await,
        Commands::Track { kind, movie_id } => lists::run_track(kind, movie_id, &output).await,
        Commands::Untrack { kind, movie_id } => lists::run_untrack(kind, movie_id, &output).await,
        Commands::Rate { movie_id, rating } => lists::run_rate(movie_id, rating, &output).await,
        Commands::Search { query, page } => recommend::run_search(&query, page, &output).await,
        Commands::Movie { movie_id } => movie::run_movie(movie_id, &output).await,
        Commands::Collection { collection_id } => movie::run_collection(collection_id, &output).await,
        Commands::TopLiked { limit } => profile::run_top_liked(limit, &output).await,
        Commands::Profile { cmd } => profile::run_profile(cmd, &output).await,
        Commands::Friends { cmd } => friends::run_friends(cmd, &output).await,
        Commands::Daemon { no_startup_sync } => daemon::run_daemon(no_startup_sync, cli.verbose, cli.quiet, &output).await,
        Commands::Config { cmd } => config::run_config(cmd, &output).await,
        Commands::Clear {
            all,
            cache,
            credentials,
            timestamps,
        } => clear::run_clear(all, cache, credentials, timestamps, &output).await,
    }
}
