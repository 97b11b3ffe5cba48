use crate::ui;
use std::path::Path;
use tandem_kernel::config::{default_config_path, load_config};
use tandem_types::config::NodeConfig;

/// Load the config file and apply command-line overrides.
pub fn resolve(path: Option<&Path>, address: Option<String>, port: Option<u16>) -> NodeConfig {
    let mut config = load_config(path);
    if let Some(address) = address {
        config.address = address;
    }
    if let Some(port) = port {
        config.port = port;
    }
    config
}

pub fn cmd_config_show(config: &NodeConfig, path: Option<&Path>) -> i32 {
    let source = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(default_config_path);

    let rendered = match toml::to_string_pretty(config) {
        Ok(s) => s,
        Err(e) => {
            ui::error(&format!("Failed to render config: {e}"));
            return 1;
        }
    };

    println!("# {} (with command-line overrides)\n", source.display());
    println!("{rendered}");

    if let Err(e) = config.validate() {
        ui::error_with_fix(
            &format!("This configuration is invalid: {e}"),
            "Edit the config file or pass --address/--port",
        );
        return 1;
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "address = \"10.0.0.2\"\nport = 6000\n").unwrap();

        let config = resolve(Some(path.as_path()), None, Some(7000));
        assert_eq!(config.address, "10.0.0.2");
        assert_eq!(config.port, 7000);

        let config = resolve(Some(path.as_path()), Some("10.0.0.9".to_string()), None);
        assert_eq!(config.address, "10.0.0.9");
        assert_eq!(config.port, 6000);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = resolve(Some(dir.path().join("absent.toml").as_path()), None, None);
        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn test_invalid_config_exits_nonzero() {
        let config = NodeConfig {
            port: 0,
            ..Default::default()
        };
        assert_eq!(cmd_config_show(&config, None), 1);
        assert_eq!(cmd_config_show(&NodeConfig::default(), None), 0);
    }
}
