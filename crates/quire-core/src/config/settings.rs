//! Application configuration loaded from a TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::fs::scan::ScanOptions;

/// Top-level configuration.
///
/// Every field has a default, so Quire runs without a config file. Call
/// [`Config::load`] to read one from disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::PathNotFound`] if the file does not exist.
    /// - [`CoreError::Io`] if the file cannot be read.
    /// - [`CoreError::ConfigParse`] if the TOML is malformed.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoreError::PathNotFound(path.to_path_buf()),
            _ => CoreError::io(path, e),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> CoreResult<Self> {
        toml::from_str(content).map_err(|e| CoreError::ConfigParse(e.to_string()))
    }

    /// Scan options derived from `[general]`.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            show_hidden: self.general.show_hidden,
            ..ScanOptions::default()
        }
    }
}

/// Naming and scanning preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Substituted for every character that cannot appear in a file name.
    #[serde(default = "default_replacement_char")]
    pub replacement_char: String,
    /// chrono pattern for names of files created without one.
    #[serde(default = "default_filename_pattern")]
    pub filename_pattern: String,
    /// Extensions treated as documents; other files are attachments.
    #[serde(default = "default_document_extensions")]
    pub document_extensions: Vec<String>,
    #[serde(default)]
    pub show_hidden: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            replacement_char: default_replacement_char(),
            filename_pattern: default_filename_pattern(),
            document_extensions: default_document_extensions(),
            show_hidden: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Buffered notifications per subscriber before it lags.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_replacement_char() -> String {
    "-".to_string()
}

fn default_filename_pattern() -> String {
    crate::fs::sanitize::DEFAULT_FILENAME_PATTERN.to_string()
}

fn default_document_extensions() -> Vec<String> {
    vec!["md".to_string(), "markdown".to_string(), "txt".to_string()]
}

fn default_channel_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_config_general() {
        let config = Config::default();

        assert_eq!(config.general.replacement_char, "-");
        assert_eq!(config.general.filename_pattern, "%Y%m%d%H%M%S.md");
        assert_eq!(config.general.document_extensions, vec!["md", "markdown", "txt"]);
        assert!(!config.general.show_hidden);
    }

    #[test]
    fn default_config_events_and_logging() {
        let config = Config::default();
        assert_eq!(config.events.channel_capacity, 256);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn load_full_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[general]
replacement_char = "_"
filename_pattern = "%Y-%m-%d.txt"
document_extensions = ["md", "org"]
show_hidden = true

[events]
channel_capacity = 16

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();

        assert_eq!(config.general.replacement_char, "_");
        assert_eq!(config.general.filename_pattern, "%Y-%m-%d.txt");
        assert_eq!(config.general.document_extensions, vec!["md", "org"]);
        assert!(config.general.show_hidden);
        assert_eq!(config.events.channel_capacity, 16);
        assert_eq!(config.logging.level, "debug");
        assert!(config.scan_options().show_hidden);
    }

    #[test]
    fn load_partial_toml_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[general]
show_hidden = true
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();

        assert!(config.general.show_hidden);
        assert_eq!(config.general.replacement_char, "-");
        assert_eq!(config.events, EventsConfig::default());
    }

    #[test]
    fn load_empty_toml_uses_all_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn load_nonexistent_returns_path_not_found() {
        let tmp = TempDir::new().unwrap();
        let result = Config::load(&tmp.path().join("nonexistent.toml"));
        assert!(matches!(result.unwrap_err(), CoreError::PathNotFound(_)));
    }

    #[test]
    fn load_invalid_toml_returns_config_parse() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "this is not valid [[[toml").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result.unwrap_err(), CoreError::ConfigParse(_)));
    }
}
