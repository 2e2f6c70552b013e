//! Configuration loader for metaloop.
//!
//! Reads `metaloop.toml` (or the path given on the command line) and
//! deserializes it into [`LoopConfig`]. Falls back to defaults when the file
//! is missing or malformed.

use std::path::Path;

use metaloop_types::config::LoopConfig;

/// Environment variable that overrides `site` from the config file.
pub const SITE_ENV: &str = "METALOOP_SITE";

/// Load configuration from `path`.
///
/// - If the file does not exist, returns [`LoopConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_config(path: &Path) -> LoopConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return LoopConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return LoopConfig::default();
        }
    };

    match toml::from_str::<LoopConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            LoopConfig::default()
        }
    }
}

/// Apply a site override, e.g. from [`SITE_ENV`]. Empty values are ignored.
pub fn apply_site_override(config: &mut LoopConfig, site: Option<String>) {
    if let Some(site) = site.filter(|s| !s.trim().is_empty()) {
        config.site = site;
    }
}
