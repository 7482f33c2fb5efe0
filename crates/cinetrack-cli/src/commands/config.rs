use crate::output::{new_table, Output};
use crate::ConfigCommands;
use cinetrack_config::{Config, PathManager, PathSource};
use color_eyre::eyre::eyre;
use color_eyre::Result;

pub async fn run_config(cmd: ConfigCommands, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show { full } => show_config(full, output),
        ConfigCommands::Init { force } => init_config(force, output),
    }
}

fn show_config(full: bool, output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let config_file = paths.config_file();
    if !config_file.exists() {
        output.warn(format!("Configuration file not found at: {}", config_file.display()));
        output.info("Create one with 'cinetrack config init'");
        return Ok(());
    }

    let mut config = Config::load_from_file(&config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
    if !full {
        config.tmdb.api_key = mask_string(&config.tmdb.api_key);
    }

    output.data(&config, || {
        output.info(format!("Config file: {}", config_file.display()));
        output.info(format!("Data directory: {} ({})", paths.data_dir().display(), layout_name(paths.source())));

        let mut table = new_table(&["Setting", "Value"]);
        let rows = [
            ("backend.base_url", config.backend.base_url.clone()),
            ("backend.timeout_secs", config.backend.timeout_secs.to_string()),
            ("tmdb.api_key", config.tmdb.api_key.clone()),
            ("tmdb.base_url", config.tmdb.base_url.clone()),
            ("tmdb.language", config.tmdb.language.clone()),
            ("cache.enabled", config.cache.enabled.to_string()),
            ("cache.max_age_days", config.cache.max_age_days.to_string()),
            ("cache.detail_batch_size", config.cache.detail_batch_size.to_string()),
            ("cache.schema_version", config.cache.schema_version.to_string()),
            ("scheduler.interval_minutes", config.scheduler.interval_minutes.to_string()),
            ("scheduler.reconnect_debounce_secs", config.scheduler.reconnect_debounce_secs.to_string()),
            ("scheduler.run_on_startup", config.scheduler.run_on_startup.to_string()),
            ("scheduler.probe_interval_secs", config.scheduler.probe_interval_secs.to_string()),
            ("recommendations.cold_start_threshold", config.recommendations.cold_start_threshold.to_string()),
            ("recommendations.learning_threshold", config.recommendations.learning_threshold.to_string()),
            ("recommendations.batch_size", config.recommendations.batch_size.to_string()),
        ];
        for (key, value) in rows {
            table.add_row(vec![key.to_string(), value]);
        }
        output.table(&table);

        if let Err(e) = config.validate() {
            output.warn(format!("Configuration is not usable yet: {}", e));
        }
    });
    Ok(())
}

fn init_config(force: bool, output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let config_file = paths.config_file();
    if config_file.exists() && !force {
        return Err(eyre!(
            "Configuration already exists at {}. Use --force to overwrite it.",
            config_file.display()
        ));
    }

    Config::template()
        .save_to_file(&config_file)
        .map_err(|e| eyre!("Failed to write config to {}: {}", config_file.display(), e))?;
    output.success(format!("Wrote starter configuration to {}", config_file.display()));
    output.info("Set backend.base_url and tmdb.api_key before running 'cinetrack login'");
    Ok(())
}

fn layout_name(source: PathSource) -> &'static str {
    match source {
        PathSource::Home => "CINETRACK_HOME",
        PathSource::Container => "container",
        PathSource::Platform => "platform default",
    }
}

fn mask_string(s: &str) -> String {
    if s.is_empty() || s == "YOUR_API_KEY" {
        return "<not set>".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_string() {
        assert_eq!(mask_string(""), "<not set>");
        assert_eq!(mask_string("YOUR_API_KEY"), "<not set>");
        assert_eq!(mask_string("abc"), "***");
        assert_eq!(mask_string("abcdef123456"), "ab***56");
    }
}
