use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::eventlog::delivery::DEFAULT_ENDPOINT;

/// Main pagelog configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub log_level: LogLevel,
    pub paths: PathsConfig,
    pub collector: CollectorConfig,
    pub listeners: Vec<ListenerConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where `file` listener sinks write JSONL
    pub events: PathBuf,
}

/// Where and how events are delivered
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Scheme and host relative endpoints are resolved against
    pub base_url: String,
    /// Path inserted in front of relative endpoints (e.g. a course prefix)
    pub prefix: Option<String>,
    /// Default delivery endpoint
    pub endpoint: String,
    /// Page URL reported with every event
    pub page: String,
    pub timeout_secs: u64,
}

/// Listener sink type
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Print a summary line to stdout
    Stdout,
    /// Append JSONL under paths.events
    File,
}

/// A listener declared in configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListenerConfig {
    pub event_type: String,
    /// Element to match exactly; absent means the unknown/any scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    pub sink: SinkKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            paths: PathsConfig::default(),
            collector: CollectorConfig::default(),
            listeners: Vec::new(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join("pagelog");

        Self {
            events: data_dir.join("events"),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            prefix: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            page: "http://localhost:8000/".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Check PAGELOG_CONFIG env var
        if let Ok(env_path) = std::env::var("PAGELOG_CONFIG") {
            let path = PathBuf::from(env_path);
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from PAGELOG_CONFIG: {}", e);
                    }
                }
            }
        }

        // Try PAGELOG_DIR/pagelog.yaml
        if let Ok(pagelog_dir) = std::env::var("PAGELOG_DIR") {
            let path = PathBuf::from(pagelog_dir).join("pagelog.yaml");
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from PAGELOG_DIR: {}", e);
                    }
                }
            }
        }

        // Try ~/.config/pagelog/pagelog.yaml
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("pagelog").join("pagelog.yaml");
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        // Try ./pagelog.yaml (for development)
        let local_config = PathBuf::from("pagelog.yaml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load local config: {}", e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Expand a path that may contain ~ or env vars
    pub fn expand_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        let expanded = shellexpand::full(&path_str).unwrap_or_else(|_| path_str.clone());
        PathBuf::from(expanded.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.collector.endpoint, "/event");
        assert!(config.collector.prefix.is_none());
        assert!(config.listeners.is_empty());
    }

    #[test]
    fn test_expand_path_no_expansion() {
        let path = PathBuf::from("/usr/local/bin");
        let expanded = Config::expand_path(&path);
        assert_eq!(expanded, PathBuf::from("/usr/local/bin"));
    }

    #[test]
    fn test_expand_path_with_env_var() {
        // SAFETY: Test runs single-threaded, env var is test-specific
        unsafe {
            std::env::set_var("PAGELOG_TEST_VAR", "/custom/path");
        }
        let path = PathBuf::from("$PAGELOG_TEST_VAR/subdir");
        let expanded = Config::expand_path(&path);
        assert_eq!(expanded, PathBuf::from("/custom/path/subdir"));
        unsafe {
            std::env::remove_var("PAGELOG_TEST_VAR");
        }
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
collector:
  base_url: http://lms.example.com
  prefix: /6002x
listeners:
  - event_type: problem_check
    sink: stdout
  - event_type: seq_goto
    element: seq_contents_0
    sink: file
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("parse");

        assert_eq!(config.collector.base_url, "http://lms.example.com");
        assert_eq!(config.collector.prefix.as_deref(), Some("/6002x"));
        assert_eq!(config.collector.endpoint, "/event");
        assert_eq!(config.collector.timeout_secs, 10);
        assert_eq!(config.listeners.len(), 2);
        assert_eq!(config.listeners[0].element, None);
        assert_eq!(config.listeners[1].element.as_deref(), Some("seq_contents_0"));
        assert_eq!(config.listeners[1].sink, SinkKind::File);
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "log_level: debug\ncollector:\n  endpoint: /track").expect("write");

        let config = Config::load(Some(&file.path().to_path_buf())).expect("load");
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.collector.endpoint, "/track");
    }

    #[test]
    fn test_load_explicit_path_missing() {
        let result = Config::load(Some(&PathBuf::from("/nonexistent/pagelog.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = Config::default();
        config.listeners.push(ListenerConfig {
            event_type: "example".to_string(),
            element: None,
            sink: SinkKind::Stdout,
        });
        let yaml_str = serde_yaml::to_string(&config).expect("Failed to serialize");
        let parsed: Config = serde_yaml::from_str(&yaml_str).expect("Failed to deserialize");
        assert_eq!(parsed.listeners, config.listeners);
        assert_eq!(parsed.collector.base_url, config.collector.base_url);
    }
}
