//! TOML-based configuration for scmlink.
//!
//! The connection section only identifies the server; credentials are the
//! business of whoever opens the connection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::capability::CacheScope;
use crate::errors::ConfigError;
use crate::timestamp::CodecZone;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Server connection settings.
    pub connection: ConnectionConfig,

    /// Timestamp codec settings.
    #[serde(default)]
    pub codec: CodecConfig,

    /// Capability cache settings.
    #[serde(default)]
    pub capability: CapabilityConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Where the SCM engine lives and which user the connection runs as.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server host name.
    pub server: String,

    /// Database connection string (e.g. `cm_typical@dim14`).
    #[serde(default)]
    pub database: String,

    /// Login user.
    #[serde(default)]
    pub user: String,
}

impl ConnectionConfig {
    /// Identity used to key the capability cache.
    pub fn identity(&self) -> String {
        if self.database.is_empty() {
            format!("{}@{}", self.user, self.server)
        } else {
            format!("{}@{}/{}", self.user, self.server, self.database)
        }
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Timestamp codec settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Zone for dates without zone information: `local`, `utc` or `+HH:MM`.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Tolerance in milliseconds when comparing dates from different
    /// formats.
    #[serde(default = "default_tolerance_ms")]
    pub tolerance_ms: i64,
}

fn default_timezone() -> String {
    "local".into()
}
fn default_tolerance_ms() -> i64 {
    1000
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            tolerance_ms: default_tolerance_ms(),
        }
    }
}

impl CodecConfig {
    /// The configured zone.
    pub fn zone(&self) -> Result<CodecZone, ConfigError> {
        self.timezone
            .parse()
            .map_err(|detail| ConfigError::InvalidValue {
                field: "codec.timezone".into(),
                detail,
            })
    }
}

// ---------------------------------------------------------------------------
// Capability cache
// ---------------------------------------------------------------------------

/// Capability cache settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityConfig {
    /// `connection` (one entry per connection) or `context` (one entry per
    /// connection, baseline and request).
    #[serde(default)]
    pub cache_scope: CacheScope,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl LinkConfig {
    /// Default config location: `<config dir>/scmlink/config.toml`.
    pub fn default_path(config_dir: &Path) -> PathBuf {
        config_dir.join("scmlink").join("config.toml")
    }

    /// Load a [`LinkConfig`] from a TOML file at the given path.
    ///
    /// This does **not** validate the values -- call
    /// [`validate`](Self::validate) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: LinkConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.server.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "connection.server".into(),
                detail: "server must not be empty".into(),
            });
        }
        self.codec.zone()?;
        if self.codec.tolerance_ms < 0 {
            return Err(ConfigError::InvalidValue {
                field: "codec.tolerance_ms".into(),
                detail: "tolerance must be >= 0".into(),
            });
        }
        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Commented default configuration written by `scmlink init`.
pub const DEFAULT_CONFIG_TOML: &str = r#"# scmlink configuration

[connection]
server = "dm.example.com"
database = "cm_typical@dim14"
user = "builder"

[codec]
# Zone for dates without zone information: local, utc or +HH:MM.
timezone = "local"
tolerance_ms = 1000

[capability]
# connection: one resolved variant per connection.
# context: one per connection, baseline and request.
cache_scope = "connection"

[log]
level = "info"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[connection]
server = "dm.example.com"
database = "cm_typical@dim14"
user = "builder"

[codec]
timezone = "+01:00"
tolerance_ms = 500

[capability]
cache_scope = "context"

[log]
level = "debug"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: LinkConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.connection.server, "dm.example.com");
        assert_eq!(config.codec.tolerance_ms, 500);
        assert_eq!(config.capability.cache_scope, CacheScope::Context);
        assert_eq!(config.log.level, "debug");
        assert_eq!(
            config.codec.zone().unwrap(),
            CodecZone::Fixed(FixedOffset::east_opt(3600).unwrap())
        );
        assert_eq!(
            config.connection.identity(),
            "builder@dm.example.com/cm_typical@dim14"
        );
    }

    #[test]
    fn test_default_config_parses_and_validates() {
        let config: LinkConfig = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        config.validate().unwrap();
        assert_eq!(config.codec.zone().unwrap(), CodecZone::Local);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = LinkConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_file_not_found() {
        let result = LinkConfig::load_from_file("/nonexistent/scmlink.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[connection\nserver = ").unwrap();
        let result = LinkConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_empty_server() {
        let mut config: LinkConfig = toml::from_str(sample_toml()).unwrap();
        config.connection.server = "  ".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "connection.server"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_timezone() {
        let mut config: LinkConfig = toml::from_str(sample_toml()).unwrap();
        config.codec.timezone = "Mars/Olympus".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "codec.timezone"
        ));
    }

    #[test]
    fn test_validate_rejects_negative_tolerance() {
        let mut config: LinkConfig = toml::from_str(sample_toml()).unwrap();
        config.codec.tolerance_ms = -1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "codec.tolerance_ms"
        ));
    }

    #[test]
    fn test_load_and_validate_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[connection]\nserver = \"\"\n").unwrap();
        assert!(LinkConfig::load_from_file(&path).is_ok());
        assert!(matches!(
            LinkConfig::load_and_validate(&path),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "connection.server"
        ));
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
[connection]
server = "dm.example.com"
"#;
        let config: LinkConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.codec.timezone, "local");
        assert_eq!(config.codec.tolerance_ms, 1000);
        assert_eq!(config.capability.cache_scope, CacheScope::Connection);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.connection.identity(), "@dm.example.com");
    }

    #[test]
    fn test_default_path() {
        let path = LinkConfig::default_path(Path::new("/home/u/.config"));
        assert_eq!(path, PathBuf::from("/home/u/.config/scmlink/config.toml"));
    }
}
