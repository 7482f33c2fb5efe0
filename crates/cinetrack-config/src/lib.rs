pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{BackendConfig, CacheConfig, Config, RecommendationConfig, SchedulerConfig, TmdbConfig};
pub use credentials::CredentialStore;
pub use paths::{PathManager, PathSource, CONTAINER_ENV, HOME_ENV};
