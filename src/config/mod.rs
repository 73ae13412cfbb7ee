mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::collections::HashSet;
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
        "./reelstream.toml",
        "./config.toml",
        "~/.config/reelstream/config.toml",
        "/etc/reelstream/config.toml",
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
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    let stream = &config.stream;
    if stream.chunk_size_cap == 0 {
        anyhow::bail!("stream.chunk_size_cap must be greater than 0");
    }
    if stream.upstream_timeout_secs == 0 {
        anyhow::bail!("stream.upstream_timeout_secs must be greater than 0");
    }
    if stream.handle_ttl_secs == 0 {
        anyhow::bail!("stream.handle_ttl_secs must be greater than 0");
    }
    if stream.sweep_interval_secs == 0 {
        anyhow::bail!("stream.sweep_interval_secs must be greater than 0");
    }
    if stream.token_secret.is_empty() {
        tracing::warn!("stream.token_secret is empty; every stream token will be rejected");
    }

    let mut names = HashSet::new();
    for conn in &config.upstream.connections {
        if conn.base_url.trim().is_empty() {
            anyhow::bail!("Upstream connection '{}' has no base_url", conn.name);
        }
        if !names.insert(conn.name.as_str()) {
            anyhow::bail!("Duplicate upstream connection name '{}'", conn.name);
        }
    }
    if config.upstream.connections.is_empty() {
        tracing::warn!("No upstream connections configured; streams will fail with 503");
    }

    Ok(())
}
