use crate::config::types::{Config, Overrides};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Every key is optional; missing keys keep their defaults.
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Parses configuration TOML without validating it
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Computes a SHA-256 fingerprint of the effective configuration
///
/// Stored on each run so that runs with different parameters can be told
/// apart.
pub fn compute_config_hash(config: &Config) -> Result<String, ConfigError> {
    let rendered = toml::to_string(config)?;
    let mut hasher = Sha256::new();
    hasher.update(rendered.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Builds the effective configuration for a run
///
/// Starts from the file at `path` (or defaults), applies `overrides`,
/// validates the result, and returns it with its fingerprint.
pub fn resolve_config(
    path: Option<&Path>,
    overrides: &Overrides,
) -> Result<(Config, String), ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    config.apply_overrides(overrides);
    validate(&config)?;

    let hash = compute_config_hash(&config)?;
    Ok((config, hash))
}
