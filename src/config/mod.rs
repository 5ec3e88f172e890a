mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./magnetcast.toml",
        "~/.config/magnetcast/config.toml",
        "/etc/magnetcast/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.publisher.interval_ms == 0 {
        anyhow::bail!("Publish interval cannot be 0");
    }

    if config.publisher.piece_length == 0 {
        anyhow::bail!("Piece length cannot be 0");
    }

    let feed_name = &config.publisher.feed_name;
    if feed_name.is_empty() || feed_name.contains('/') || feed_name.contains('\\') {
        anyhow::bail!("Feed name must be a plain file name, got {:?}", feed_name);
    }

    regex::Regex::new(&config.publisher.playlist_pattern).with_context(|| {
        format!(
            "Invalid playlist pattern: {:?}",
            config.publisher.playlist_pattern
        )
    })?;

    if config.window.max_sessions == 0 {
        anyhow::bail!("Seeding window must allow at least one session");
    }

    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.consumer.poll_interval_ms == 0 {
        anyhow::bail!("Poll interval cannot be 0");
    }

    if let Some(gateway) = &config.consumer.gateway {
        url::Url::parse(gateway)
            .with_context(|| format!("Invalid gateway URL: {:?}", gateway))?;
    }

    if config.consumer.retrieval_retries > 0 && config.consumer.retry_delay_ms == 0 {
        tracing::warn!("Retrieval retries configured with no delay between attempts");
    }

    Ok(())
}
