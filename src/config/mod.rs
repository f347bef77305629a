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
        "./mediashift.toml",
        "./config.toml",
        "~/.config/mediashift/config.toml",
        "/etc/mediashift/config.toml",
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
    if config.conversion.consecutive_error_limit == 0 {
        anyhow::bail!("conversion.consecutive_error_limit must be at least 1");
    }

    if config.conversion.compare_chunk_size == 0 {
        anyhow::bail!("conversion.compare_chunk_size cannot be 0");
    }

    if config.cleanup.workers == 0 {
        anyhow::bail!("cleanup.workers must be at least 1");
    }

    if config.cleanup.queue_capacity == 0 {
        anyhow::bail!("cleanup.queue_capacity cannot be 0");
    }

    if config.media.folder.trim_matches('/').is_empty() {
        anyhow::bail!("media.folder cannot be empty");
    }

    if !config.media.root.exists() {
        tracing::warn!("Media root does not exist: {:?}", config.media.root);
    }

    Ok(())
}
