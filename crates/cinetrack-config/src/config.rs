use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ten years; detail freshness windows beyond this are treated as misconfiguration
pub const MAX_AGE_DAYS_LIMIT: i64 = 3650;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub recommendations: RecommendationConfig,
}

/// Authenticated CRUD backend holding per-user lists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Movie metadata provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbConfig {
    pub api_key: String,
    #[serde(default = "default_tmdb_base_url")]
    pub base_url: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default for the cache toggle until the user flips it
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
    #[serde(default = "default_detail_batch_size")]
    pub detail_batch_size: usize,
    /// Bumping this drops every local collection on next open
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default = "default_reset_max_attempts")]
    pub reset_max_attempts: u32,
    #[serde(default = "default_reset_base_delay_ms")]
    pub reset_base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_reconnect_debounce_secs")]
    pub reconnect_debounce_secs: u64,
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
    /// How often the daemon probes the backend to detect connectivity changes
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    #[serde(default = "default_cold_start_threshold")]
    pub cold_start_threshold: usize,
    #[serde(default = "default_learning_threshold")]
    pub learning_threshold: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_pages_per_facet")]
    pub max_pages_per_facet: u32,
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_tmdb_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_max_age_days() -> i64 {
    7
}

fn default_detail_batch_size() -> usize {
    10
}

fn default_schema_version() -> u32 {
    1
}

fn default_reset_max_attempts() -> u32 {
    10
}

fn default_reset_base_delay_ms() -> u64 {
    100
}

fn default_interval_minutes() -> u64 {
    30
}

fn default_reconnect_debounce_secs() -> u64 {
    2
}

fn default_probe_interval_secs() -> u64 {
    15
}

fn default_cold_start_threshold() -> usize {
    5
}

fn default_learning_threshold() -> usize {
    15
}

fn default_batch_size() -> usize {
    50
}

fn default_max_pages_per_facet() -> u32 {
    3
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_age_days: default_max_age_days(),
            detail_batch_size: default_detail_batch_size(),
            schema_version: default_schema_version(),
            reset_max_attempts: default_reset_max_attempts(),
            reset_base_delay_ms: default_reset_base_delay_ms(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            reconnect_debounce_secs: default_reconnect_debounce_secs(),
            run_on_startup: default_true(),
            probe_interval_secs: default_probe_interval_secs(),
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            cold_start_threshold: default_cold_start_threshold(),
            learning_threshold: default_learning_threshold(),
            batch_size: default_batch_size(),
            max_pages_per_facet: default_max_pages_per_facet(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend.base_url.is_empty() {
            return Err(anyhow::anyhow!("backend.base_url is required"));
        }
        if !self.backend.base_url.starts_with("http://") && !self.backend.base_url.starts_with("https://") {
            return Err(anyhow::anyhow!("backend.base_url must be an http(s) URL"));
        }
        if self.tmdb.api_key.is_empty() || self.tmdb.api_key == "YOUR_API_KEY" {
            return Err(anyhow::anyhow!("tmdb.api_key is not configured"));
        }

        if self.cache.max_age_days <= 0 || self.cache.max_age_days > MAX_AGE_DAYS_LIMIT {
            return Err(anyhow::anyhow!(
                "cache.max_age_days must be between 1 and {}",
                MAX_AGE_DAYS_LIMIT
            ));
        }
        if self.cache.detail_batch_size == 0 {
            return Err(anyhow::anyhow!("cache.detail_batch_size must be at least 1"));
        }
        if self.cache.reset_max_attempts == 0 {
            return Err(anyhow::anyhow!("cache.reset_max_attempts must be at least 1"));
        }

        if self.scheduler.interval_minutes == 0 {
            return Err(anyhow::anyhow!("scheduler.interval_minutes must be at least 1"));
        }

        let rec = &self.recommendations;
        if rec.batch_size == 0 {
            return Err(anyhow::anyhow!("recommendations.batch_size must be at least 1"));
        }
        if rec.cold_start_threshold > rec.learning_threshold {
            return Err(anyhow::anyhow!(
                "recommendations.cold_start_threshold ({}) must not exceed learning_threshold ({})",
                rec.cold_start_threshold,
                rec.learning_threshold
            ));
        }

        Ok(())
    }

    /// Starter configuration written by `cinetrack config init`
    pub fn template() -> Self {
        Self {
            backend: BackendConfig {
                base_url: "http://localhost:3000/api".to_string(),
                timeout_secs: default_timeout_secs(),
            },
            tmdb: TmdbConfig {
                api_key: "YOUR_API_KEY".to_string(),
                base_url: default_tmdb_base_url(),
                language: default_language(),
                timeout_secs: default_timeout_secs(),
            },
            cache: CacheConfig::default(),
            scheduler: SchedulerConfig::default(),
            recommendations: RecommendationConfig::default(),
        }
    }
}
