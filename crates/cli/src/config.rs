//! CLI configuration utilities

use anyhow::{Context, Result};
use sessiongate_core::FileSessionStore;
use sessiongate_http::ClientConfig;
use std::path::{Path, PathBuf};

/// Load client configuration, layering the optional file over defaults
pub fn load_client_config(path: Option<&Path>) -> Result<ClientConfig> {
    ClientConfig::load(path).with_context(|| match path {
        Some(path) => format!("failed to load configuration from {}", path.display()),
        None => "failed to load configuration".to_string(),
    })
}

/// Where the session file lives for this configuration
pub fn session_path(config: &ClientConfig) -> Result<PathBuf> {
    match &config.store_path {
        Some(path) => Ok(path.clone()),
        None => Ok(FileSessionStore::default_path()?),
    }
}

/// Save client configuration as TOML
pub fn save_client_config<P: AsRef<Path>>(config: &ClientConfig, path: P) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Generate a default configuration file
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let config = ClientConfig::default();
    save_client_config(&config, path)
}
