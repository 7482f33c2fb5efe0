pub mod backend;
pub mod error;
pub mod tmdb;
pub mod traits;

pub use backend::{BackendClient, LikeCount};
pub use error::SourceError;
pub use tmdb::TmdbClient;
pub use traits::{MetadataProvider, MovieFeed, TrackerBackend, TrendingWindow};
