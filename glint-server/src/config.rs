//! Configuration for the share server binary.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Network settings.
    pub network: NetworkConfig,
    /// Upload spool settings.
    pub uploads: UploadConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind the WebSocket listener on.
    pub address: String,
    /// TCP port for viewer connections.
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Where opaque viewer uploads are spooled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory uploads are written into.
    pub spool_dir: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            spool_dir: "uploads".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Tracing filter directive, e.g. `info` or `glint_core=debug`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl ServerSettings {
    /// Load settings from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = ServerSettings::default();
        assert_eq!(settings.network.address, "127.0.0.1");
        assert_eq!(settings.network.port, 3000);
        assert_eq!(settings.logging.filter, "info");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let settings: ServerSettings = toml::from_str("[network]\nport = 4100\n").unwrap();
        assert_eq!(settings.network.port, 4100);
        assert_eq!(settings.network.address, "127.0.0.1");
        assert_eq!(settings.uploads.spool_dir, "uploads");
    }

    #[test]
    fn roundtrips_through_toml() {
        let settings = ServerSettings::default();
        let text = toml::to_string_pretty(&settings).unwrap();
        let back: ServerSettings = toml::from_str(&text).unwrap();
        assert_eq!(back.network.port, settings.network.port);
    }
}
