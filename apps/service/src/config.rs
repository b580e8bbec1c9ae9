use std::time::Duration;
use std::{env, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitoring::types::Target;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config: {0}")]
    ReadFailed(std::io::Error),
    #[error("failed to write config: {0}")]
    WriteFailed(std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config path available")]
    ConfigPathUnavailable,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: Monitor,
    #[serde(default)]
    pub web: Web,
    /// The target table, in the order it is probed and displayed.
    #[serde(default)]
    pub services: Vec<Target>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Monitor {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Web {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// Public dashboard URL, shown in the chat summary.
    #[serde(default)]
    pub public_url: Option<String>,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_bind() -> String {
    "0.0.0.0".into()
}

fn default_web_port() -> u16 {
    25577
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

impl Default for Web {
    fn default() -> Self {
        Self { bind: default_bind(), port: default_web_port(), public_url: None }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { monitor: Monitor::default(), web: Web::default(), services: Vec::new() }
    }
}

impl Monitor {
    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Default config path ($XDG_CONFIG_HOME/statuswatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("statuswatch/config.toml"))
}

impl Config {
    /// Load the configuration from a file.
    ///
    /// Writes a default config to ~/.config/statuswatch/config.toml, or the
    /// specified path with the name config.toml, if one does not exist.
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(Error::ReadFailed)?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Error::WriteFailed)?;
        }

        fs::write(path, config_str).map_err(Error::WriteFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::ServiceKind;

    const SAMPLE: &str = r#"
        [monitor]
        poll_interval_secs = 30
        refresh_interval_secs = 120

        [web]
        bind = "127.0.0.1"
        port = 8090
        public_url = "https://status.example.net"

        [[services]]
        name = "Music Bot"
        kind = "heartbeat"
        category = "services"
        port = 25579
        description = "music bot with heartbeats"

        [[services]]
        name = "Survival"
        kind = "port"
        category = "games"
        host = "games.example.net"
        port = 25565

        [[services]]
        name = "Portfolio"
        kind = "http"
        category = "websites"
        url = "https://example.net"
        link = "https://example.net"

        [[services]]
        name = "Audio Relay"
        kind = "relay"
        category = "services"
        host = "audio.example.net"
        port = 2333
    "#;

    #[test]
    fn parses_all_four_target_kinds() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.monitor.poll_interval_secs, 30);
        assert_eq!(config.web.port, 8090);
        assert_eq!(config.services.len(), 4);
        assert_eq!(config.services[0].kind, ServiceKind::Heartbeat);
        assert_eq!(config.services[1].kind, ServiceKind::Port);
        assert_eq!(config.services[2].kind, ServiceKind::Http);
        assert_eq!(config.services[3].kind, ServiceKind::Relay);
        // Configuration order is probe and display order.
        assert_eq!(config.services[1].name, "Survival");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.monitor.poll_interval_secs, 60);
        assert_eq!(config.monitor.refresh_interval_secs, 300);
        assert_eq!(config.web.bind, "0.0.0.0");
        assert!(config.services.is_empty());
    }

    #[test]
    fn missing_file_writes_a_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::from_config(Some(&path)).unwrap();
        assert!(path.exists());
        assert!(config.services.is_empty());

        // Reloading reads the file that was just written.
        let reloaded = Config::from_config(Some(&path)).unwrap();
        assert_eq!(reloaded.web.port, config.web.port);
    }

    #[test]
    fn non_toml_extension_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        Config::from_config(Some(&path)).unwrap();
        assert!(dir.path().join("config.toml").exists());
    }
}
