//! # Tally Configuration
//!
//! Settings for storage, invoice numbering and reporting.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_DB_PATH=/var/lib/tally/tally.db                              │
//! │     TALLY_IDENTIFIER_STRATEGY=sequential                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tally/tally.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.tally.tally/tally.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     tally.db, INV prefix, timestamp numbers, month-of-year buckets     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # tally.toml
//! [database]
//! path = "tally.db"
//! max_connections = 5
//!
//! [invoicing]
//! prefix = "INV"
//! identifier_strategy = "timestamp"  # timestamp | sequential
//! sequence_start = 1
//! max_identifier_attempts = 5
//!
//! [reporting]
//! month_bucketing = "month_of_year"  # month_of_year | year_month
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::pool::DbConfig;
use tally_core::{
    IdentifierStrategy, InvoiceIdentifierGenerator, MonthBucketing, DEFAULT_INVOICE_PREFIX,
    DEFAULT_MAX_IDENTIFIER_ATTEMPTS,
};

/// Longest prefix accepted; identifiers must fit the 64-char reference limit.
const MAX_PREFIX_LEN: usize = 16;

// =============================================================================
// Database Settings
// =============================================================================

/// Where and how the SQLite database is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite file. Relative paths resolve against the working
    /// directory.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("tally.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Invoicing Settings
// =============================================================================

/// Invoice numbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicingSettings {
    /// Prefix of every invoice number (`INV-...`).
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// How numbers are produced.
    #[serde(default)]
    pub identifier_strategy: IdentifierStrategy,

    /// First counter value for the sequential strategy.
    #[serde(default = "default_sequence_start")]
    pub sequence_start: u64,

    /// Attempts with fresh numbers before a duplicate is reported.
    #[serde(default = "default_max_identifier_attempts")]
    pub max_identifier_attempts: u32,
}

fn default_prefix() -> String {
    DEFAULT_INVOICE_PREFIX.to_string()
}

fn default_sequence_start() -> u64 {
    1
}

fn default_max_identifier_attempts() -> u32 {
    DEFAULT_MAX_IDENTIFIER_ATTEMPTS
}

impl Default for InvoicingSettings {
    fn default() -> Self {
        InvoicingSettings {
            prefix: default_prefix(),
            identifier_strategy: IdentifierStrategy::default(),
            sequence_start: default_sequence_start(),
            max_identifier_attempts: default_max_identifier_attempts(),
        }
    }
}

// =============================================================================
// Reporting Settings
// =============================================================================

/// Revenue report shaping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingSettings {
    /// Whether monthly buckets merge the same month of different years.
    #[serde(default)]
    pub month_bucketing: MonthBucketing,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete Tally configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub invoicing: InvoicingSettings,

    #[serde(default)]
    pub reporting: ReportingSettings,
}

impl TallyConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (tally.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file, creating the parent directory.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::Invalid("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        let prefix = &self.invoicing.prefix;
        if prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("invoicing.prefix must not be empty".into()));
        }
        if prefix.len() > MAX_PREFIX_LEN {
            return Err(ConfigError::Invalid(format!(
                "invoicing.prefix must be at most {} characters, got {}",
                MAX_PREFIX_LEN,
                prefix.len()
            )));
        }
        if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(ConfigError::Invalid(format!(
                "invoicing.prefix may only contain letters, digits, '-' and '_', got '{}'",
                prefix
            )));
        }

        if self.invoicing.max_identifier_attempts == 0 {
            return Err(ConfigError::Invalid(
                "invoicing.max_identifier_attempts must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `TALLY_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key/value source.
    ///
    /// Unparseable values are logged and ignored.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("TALLY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("TALLY_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(m) => self.database.max_connections = m,
                Err(_) => warn!(value = %max, "Invalid TALLY_DB_MAX_CONNECTIONS in environment"),
            }
        }

        if let Some(prefix) = lookup("TALLY_INVOICE_PREFIX") {
            self.invoicing.prefix = prefix;
        }

        if let Some(strategy) = lookup("TALLY_IDENTIFIER_STRATEGY") {
            match strategy.parse() {
                Ok(parsed) => {
                    debug!(strategy = %strategy, "Overriding identifier strategy from environment");
                    self.invoicing.identifier_strategy = parsed;
                }
                Err(_) => warn!(strategy = %strategy, "Unknown identifier strategy in environment"),
            }
        }

        if let Some(attempts) = lookup("TALLY_MAX_IDENTIFIER_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(a) => self.invoicing.max_identifier_attempts = a,
                Err(_) => warn!(value = %attempts, "Invalid TALLY_MAX_IDENTIFIER_ATTEMPTS in environment"),
            }
        }

        if let Some(bucketing) = lookup("TALLY_MONTH_BUCKETING") {
            match bucketing.parse() {
                Ok(parsed) => self.reporting.month_bucketing = parsed,
                Err(_) => warn!(bucketing = %bucketing, "Unknown month bucketing in environment"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "tally")
            .map(|dirs| dirs.config_dir().join("tally.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Pool settings for [`Database::new`](crate::pool::Database::new).
    pub fn db_config(&self) -> DbConfig {
        DbConfig::from(&self.database)
    }

    /// Builds the configured invoice number generator.
    pub fn identifier_generator(&self) -> Box<dyn InvoiceIdentifierGenerator> {
        self.invoicing
            .identifier_strategy
            .build(&self.invoicing.prefix, self.invoicing.sequence_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("tally-config-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_default_config() {
        let config = TallyConfig::default();
        assert_eq!(config.database.path, PathBuf::from("tally.db"));
        assert_eq!(config.invoicing.prefix, "INV");
        assert_eq!(config.invoicing.identifier_strategy, IdentifierStrategy::Timestamp);
        assert_eq!(config.invoicing.max_identifier_attempts, 5);
        assert_eq!(config.reporting.month_bucketing, MonthBucketing::MonthOfYear);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: TallyConfig = toml::from_str(
            r#"
            [invoicing]
            identifier_strategy = "sequential"

            [reporting]
            month_bucketing = "year_month"
            "#,
        )
        .unwrap();

        assert_eq!(config.invoicing.identifier_strategy, IdentifierStrategy::Sequential);
        assert_eq!(config.invoicing.prefix, "INV");
        assert_eq!(config.reporting.month_bucketing, MonthBucketing::YearMonth);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = TallyConfig::default();

        config.database.max_connections = 0;
        assert!(config.validate().is_err());
        config.database.max_connections = 5;

        config.invoicing.prefix = "   ".to_string();
        assert!(config.validate().is_err());
        config.invoicing.prefix = "BILL/2024".to_string();
        assert!(config.validate().is_err());
        config.invoicing.prefix = "X".repeat(17);
        assert!(config.validate().is_err());
        config.invoicing.prefix = "BILL_24".to_string();
        assert!(config.validate().is_ok());

        config.invoicing.max_identifier_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("TALLY_DB_PATH", "/data/tally.db"),
            ("TALLY_DB_MAX_CONNECTIONS", "not-a-number"),
            ("TALLY_INVOICE_PREFIX", "BILL"),
            ("TALLY_IDENTIFIER_STRATEGY", "sequential"),
            ("TALLY_MAX_IDENTIFIER_ATTEMPTS", "3"),
            ("TALLY_MONTH_BUCKETING", "year_month"),
        ]
        .into_iter()
        .collect();

        let mut config = TallyConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/data/tally.db"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.invoicing.prefix, "BILL");
        assert_eq!(config.invoicing.identifier_strategy, IdentifierStrategy::Sequential);
        assert_eq!(config.invoicing.max_identifier_attempts, 3);
        assert_eq!(config.reporting.month_bucketing, MonthBucketing::YearMonth);
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("tally.toml");

        let mut config = TallyConfig::default();
        config.invoicing.prefix = "BILL".to_string();
        config.invoicing.identifier_strategy = IdentifierStrategy::Sequential;
        config.save(Some(path.clone())).unwrap();

        let loaded = TallyConfig::load(Some(path.clone())).unwrap();
        assert_eq!(loaded.invoicing.prefix, "BILL");
        assert_eq!(loaded.invoicing.identifier_strategy, IdentifierStrategy::Sequential);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_invalid_file_falls_back_to_default() {
        let path = temp_path("broken.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[invoicing]\nmax_identifier_attempts = \"many\"\n").unwrap();

        assert!(matches!(
            TallyConfig::load(Some(path.clone())),
            Err(ConfigError::Parse(_))
        ));
        assert_eq!(TallyConfig::load_or_default(Some(path.clone())), TallyConfig::default());

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_identifier_generator_from_config() {
        let mut config = TallyConfig::default();
        config.invoicing.identifier_strategy = IdentifierStrategy::Sequential;
        config.invoicing.sequence_start = 42;

        let ids = config.identifier_generator();
        assert_eq!(ids.next_identifier(), "INV-000042");
        assert_eq!(ids.next_identifier(), "INV-000043");
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&TallyConfig::default()).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[invoicing]"));
        assert!(toml_str.contains("identifier_strategy = \"timestamp\""));
        assert!(toml_str.contains("month_bucketing = \"month_of_year\""));
    }
}
