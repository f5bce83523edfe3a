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

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./clipstream.toml",
        "~/.config/clipstream/config.toml",
        "/etc/clipstream/config.toml",
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
fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if !config.media.root.exists() {
        tracing::warn!("Media root does not exist: {:?}", config.media.root);
    }

    // Private cloud-transform deliveries need both halves of the credential.
    let ct = &config.cloud_transform;
    if ct.api_key.is_some() != ct.api_secret.is_some() {
        anyhow::bail!("cloud_transform needs both api_key and api_secret, or neither");
    }

    if config.file_share.host.is_empty() {
        anyhow::bail!("file_share.host cannot be empty");
    }

    if config.transform.width == 0 || config.transform.height == 0 {
        anyhow::bail!("transform width/height cannot be 0");
    }

    Ok(())
}
