//! Configuration for the sales loader
//!
//! Tunable constants live at the top of this module. `Settings` holds the two
//! values every run needs (connection target and input directory), resolved
//! from CLI flags first and the environment second.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

// ============================================================================
// Connection Configuration
// ============================================================================

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(45);

/// Environment variable holding the connection target
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

/// Environment variable holding the input directory
pub const INPUT_DIR_VAR: &str = "CSV_FOLDER_PATH";

// ============================================================================
// Batch Configuration
// ============================================================================

/// Upper bound on bind parameters in a single statement
///
/// 32766 is SQLite's compiled-in default for `SQLITE_MAX_VARIABLE_NUMBER`;
/// PostgreSQL allows 65535, so the smaller limit applies to both backends.
pub const MAX_BIND_PARAMETERS: usize = 32_766;

/// Default number of rows written by one INSERT statement
pub const DEFAULT_BATCH_SIZE: usize = 500;

// ============================================================================
// Input Configuration
// ============================================================================

/// The AdventureWorks extracts are exported with `;` separators
pub const DEFAULT_DELIMITER: u8 = b';';

/// Extension of the files picked up from the input directory
pub const INPUT_EXTENSION: &str = "csv";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} is not set. Pass {flag} or set {var} in the environment or a .env file")]
    Missing {
        var: &'static str,
        flag: &'static str,
    },

    #[error(
        "Unsupported database URL '{0}'. Expected postgres://, postgresql:// or sqlite: scheme"
    )]
    UnsupportedDatabase(String),

    #[error("Input directory '{}' does not exist or is not a directory", .0.display())]
    InputDirNotFound(PathBuf),

    #[error("Delimiter must be a single ASCII character, got '{0}'")]
    InvalidDelimiter(String),
}

/// Resolved run settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub input_dir: PathBuf,
}

impl Settings {
    /// Resolve settings, preferring explicit values over the environment
    pub fn resolve(
        database_url: Option<String>,
        input_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let database_url = database_url
            .or_else(|| non_empty_var(DATABASE_URL_VAR))
            .ok_or(ConfigError::Missing {
                var: DATABASE_URL_VAR,
                flag: "--database-url",
            })?;

        let input_dir = input_dir
            .or_else(|| non_empty_var(INPUT_DIR_VAR).map(PathBuf::from))
            .ok_or(ConfigError::Missing {
                var: INPUT_DIR_VAR,
                flag: "--input-dir",
            })?;

        let settings = Self {
            database_url,
            input_dir,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if crate::db::Backend::from_url(&self.database_url).is_none() {
            return Err(ConfigError::UnsupportedDatabase(self.database_url.clone()));
        }
        if !self.input_dir.is_dir() {
            return Err(ConfigError::InputDirNotFound(self.input_dir.clone()));
        }
        Ok(())
    }
}

/// Parse a delimiter argument; `\t` is accepted as an escape for tab
pub fn parse_delimiter(s: &str) -> Result<u8, ConfigError> {
    match s {
        "\\t" => Ok(b'\t'),
        _ if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        _ => Err(ConfigError::InvalidDelimiter(s.to_string())),
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
