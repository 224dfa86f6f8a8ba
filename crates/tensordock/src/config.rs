//! Client configuration.
//!
//! Settings are resolved once at startup from, in order of precedence,
//! command-line flags (and their environment variables), the YAML config
//! file (`~/.tensordock.yml` by default), and built-in defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TensorDockError};
use crate::transport::DEFAULT_BASE_URL;

/// Config file name under the home directory.
pub const CONFIG_FILE_NAME: &str = ".tensordock.yml";

/// Default config file location, `~/.tensordock.yml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
}

/// API key and token pair.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// API key.
    pub api_key: String,
    /// API token.
    pub api_token: String,
}

impl Credentials {
    /// Create a credential pair.
    pub fn new(api_key: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_token: api_token.into(),
        }
    }

    /// Whether either half is missing.
    pub fn is_incomplete(&self) -> bool {
        self.api_key.is_empty() || self.api_token.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// On-disk config file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    /// API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// API token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    /// Log raw requests and responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
}

impl ConfigFile {
    /// Load the config file, returning `None` when it does not exist.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found");
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            TensorDockError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        if contents.trim().is_empty() {
            return Ok(Some(Self::default()));
        }

        let file = serde_yaml::from_str(&contents).map_err(|e| {
            TensorDockError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(Some(file))
    }

    /// Write the config file, replacing any previous contents.
    ///
    /// # Errors
    /// Returns error if the file cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| TensorDockError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents).map_err(|e| {
            TensorDockError::Config(format!("failed to write {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "saved config file");
        Ok(())
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// API key.
    pub api_key: Option<String>,
    /// API token.
    pub api_token: Option<String>,
    /// API base URL.
    pub service_url: Option<String>,
    /// Debug flag; only `true` overrides the file.
    pub debug: bool,
}

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// API base URL.
    pub service_url: String,
    /// Credentials for authenticated endpoints.
    pub credentials: Credentials,
    /// Log raw requests and responses.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_BASE_URL.to_string(),
            credentials: Credentials::default(),
            debug: false,
        }
    }
}

impl Config {
    /// Merge overrides over the config file over defaults.
    #[must_use]
    pub fn resolve(overrides: ConfigOverrides, file: Option<ConfigFile>) -> Self {
        let file = file.unwrap_or_default();
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        Self {
            service_url: non_empty(overrides.service_url)
                .or_else(|| non_empty(file.service_url))
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            credentials: Credentials {
                api_key: non_empty(overrides.api_key)
                    .or_else(|| non_empty(file.api_key))
                    .unwrap_or_default(),
                api_token: non_empty(overrides.api_token)
                    .or_else(|| non_empty(file.api_token))
                    .unwrap_or_default(),
            },
            debug: overrides.debug || file.debug.unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults() {
        let config = Config::resolve(ConfigOverrides::default(), None);
        assert_eq!(config, Config::default());
        assert_eq!(config.service_url, "https://console.tensordock.com/api");
    }

    #[test]
    fn test_overrides_win_over_file() {
        let file = ConfigFile {
            api_key: Some("file-key".to_string()),
            api_token: Some("file-token".to_string()),
            service_url: Some("https://file.example/api".to_string()),
            debug: Some(true),
        };
        let overrides = ConfigOverrides {
            api_key: Some("flag-key".to_string()),
            api_token: Some(String::new()),
            ..ConfigOverrides::default()
        };

        let config = Config::resolve(overrides, Some(file));
        assert_eq!(config.credentials, Credentials::new("flag-key", "file-token"));
        assert_eq!(config.service_url, "https://file.example/api");
        assert!(config.debug);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        assert_eq!(ConfigFile::load(&path).unwrap(), None);

        let file = ConfigFile {
            api_key: Some("key".to_string()),
            api_token: Some("token".to_string()),
            ..ConfigFile::default()
        };
        file.save(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("apiKey: key"));
        assert!(!written.contains("serviceUrl"));
        assert_eq!(ConfigFile::load(&path).unwrap(), Some(file));
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "apiKey: [unterminated").unwrap();

        let err = ConfigFile::load(&path).unwrap_err();
        assert!(matches!(err, TensorDockError::Config(_)));
    }

    #[test]
    fn test_credentials_debug_redacts_token() {
        let rendered = format!("{:?}", Credentials::new("key", "super-secret"));
        assert!(!rendered.contains("super-secret"));
    }
}
