//! Engine configuration module.
//!
//! Loads the driver's settings from environment variables.
//!
//! # Environment Variables
//!
//! - `BTREE_DATABASE_FILE`: Backing file of the tree (default: `btree.bin`)
//! - `BTREE_GENERATE_COUNT`: Random records to upsert at startup (default: `0`)
//! - `BTREE_GENERATOR_SEED`: Seed for a reproducible generator run (optional)
//! - `BTREE_LOOKUP_KEYS`: Comma-separated keys to look up afterwards (optional)

use std::path::PathBuf;

const DATABASE_FILE_VAR: &str = "BTREE_DATABASE_FILE";
const GENERATE_COUNT_VAR: &str = "BTREE_GENERATE_COUNT";
const GENERATOR_SEED_VAR: &str = "BTREE_GENERATOR_SEED";
const LOOKUP_KEYS_VAR: &str = "BTREE_LOOKUP_KEYS";

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Path of the tree's backing file. Created on first open.
    pub database_file: PathBuf,
    /// Number of random upserts the generator performs; 0 disables it.
    pub generate_count: usize,
    /// Generator seed. `None` seeds from the OS.
    pub generator_seed: Option<u64>,
    /// Keys to look up once generation is done.
    pub lookup_keys: Vec<i64>,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl EngineConfig {
    /// Default backing file.
    pub const DEFAULT_DATABASE_FILE: &'static str = "btree.bin";

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but does not parse, or if
    /// `BTREE_DATABASE_FILE` is set to an empty string.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database_file: load_database_file(lookup(DATABASE_FILE_VAR))?,
            generate_count: lookup(GENERATE_COUNT_VAR)
                .map_or(Ok(0), |value| parse_number(GENERATE_COUNT_VAR, &value))?,
            generator_seed: lookup(GENERATOR_SEED_VAR)
                .map(|value| parse_number(GENERATOR_SEED_VAR, &value))
                .transpose()?,
            lookup_keys: lookup(LOOKUP_KEYS_VAR)
                .map_or(Ok(Vec::new()), |value| load_lookup_keys(&value))?,
        })
    }
}

fn load_database_file(value: Option<String>) -> Result<PathBuf, ConfigError> {
    match value {
        Some(value) if value.is_empty() => Err(ConfigError::InvalidValue {
            name: DATABASE_FILE_VAR.to_string(),
            message: "must not be empty".to_string(),
        }),
        Some(value) => Ok(PathBuf::from(value)),
        None => Ok(PathBuf::from(EngineConfig::DEFAULT_DATABASE_FILE)),
    }
}

fn load_lookup_keys(value: &str) -> Result<Vec<i64>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_number(LOOKUP_KEYS_VAR, part))
        .collect()
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' is not a valid number"),
        })
}
