//! Configuration loading for the catalog client.
//!
//! All fields are required unless explicitly marked optional.

use nuvex_storage::CacheConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Root of the remote store, e.g. `https://xyz.example.co`.
    pub api_base_url: String,
    /// Public key sent as `apikey` on every request.
    pub anon_key: String,
    /// Session token of a signed-in actor. Absent means anonymous.
    pub access_token: Option<String>,
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    pub entry_ttl_secs: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or NUVEX_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must be an http(s) URL".to_string(),
            });
        }
        if self.anon_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "anon_key",
                reason: "must not be empty".to_string(),
            });
        }
        if matches!(&self.access_token, Some(token) if token.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "access_token",
                reason: "must not be empty when set".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.entry_ttl_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "cache.entry_ttl_secs",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cache_config(&self) -> CacheConfig {
        match self.cache.entry_ttl_secs {
            Some(secs) => CacheConfig::new().with_ttl(Duration::from_secs(secs)),
            None => CacheConfig::new(),
        }
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("NUVEX_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"
api_base_url = "https://catalog.example.co/"
anon_key = "public-anon-key"
request_timeout_ms = 5000

[cache]
entry_ttl_secs = 30
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn test_loads_valid_file() {
        let file = write_config(VALID);
        let config = ClientConfig::from_path(file.path()).expect("parse");
        config.validate().expect("valid");
        assert_eq!(config.anon_key, "public-anon-key");
        assert!(config.access_token.is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.cache_config().entry_ttl,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_cache_table_is_optional() {
        let file = write_config(
            r#"
api_base_url = "http://localhost:54321"
anon_key = "k"
request_timeout_ms = 100
"#,
        );
        let config = ClientConfig::from_path(file.path()).expect("parse");
        assert!(config.cache_config().entry_ttl.is_none());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let file = write_config(&format!("{VALID}\nrefresh_interval_ms = 10\n"));
        assert!(matches!(
            ClientConfig::from_path(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ClientConfig::from_path(Path::new("/nonexistent/nuvex.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let file = write_config(VALID);
        let base = ClientConfig::from_path(file.path()).expect("parse");

        let mut config = base.clone();
        config.anon_key = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "anon_key", .. })
        ));

        let mut config = base.clone();
        config.api_base_url = "catalog.example.co".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "api_base_url", .. })
        ));

        let mut config = base.clone();
        config.request_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "request_timeout_ms", .. })
        ));

        let mut config = base.clone();
        config.access_token = Some(String::new());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "access_token", .. })
        ));

        let mut config = base;
        config.cache.entry_ttl_secs = Some(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "cache.entry_ttl_secs", .. })
        ));
    }
}
