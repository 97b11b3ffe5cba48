//! Configuration loading from `~/.tandem/config.toml` with defaults.

use std::path::{Path, PathBuf};
use tandem_types::config::NodeConfig;
use tracing::info;

/// Default location of the config file.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tandem")
        .join("config.toml")
}

/// Load node configuration from a TOML file, with defaults.
///
/// A missing, unreadable or malformed file is not fatal: the problem is logged
/// and the defaults are used.
pub fn load_config(path: Option<&Path>) -> NodeConfig {
    let config_path = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(default_config_path);

    if !config_path.exists() {
        info!(
            path = %config_path.display(),
            "Config file not found, using defaults"
        );
        return NodeConfig::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(contents) => match toml::from_str::<NodeConfig>(&contents) {
            Ok(config) => {
                info!(path = %config_path.display(), "Loaded configuration");
                config
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %config_path.display(),
                    "Failed to parse config, using defaults"
                );
                NodeConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = %config_path.display(),
                "Failed to read config file, using defaults"
            );
            NodeConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(dir.path().join("nope.toml").as_path()));
        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "address = \"10.0.0.7\"").unwrap();
        writeln!(file, "port = 5100").unwrap();
        writeln!(file, "heartbeat_interval_ms = 2000").unwrap();

        let config = load_config(Some(file.path()));
        assert_eq!(config.address, "10.0.0.7");
        assert_eq!(config.port, 5100);
        assert_eq!(config.heartbeat_interval_ms, 2000);
        assert_eq!(config.liveness_interval_ms, 1000);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();
        let config = load_config(Some(file.path()));
        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn test_default_path_ends_with_config_toml() {
        let path = default_config_path();
        assert!(path.ends_with(".tandem/config.toml"));
    }
}
