use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

use crate::dialect::DialectKind;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// SQL generator configuration with validation
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Target database dialect
    pub dialect: DialectKind,

    /// Maximum number of lookups a single field key may traverse
    #[validate(range(
        min = 1,
        max = 64,
        message = "Max lookup depth must be between 1 and 64"
    ))]
    pub max_lookup_depth: usize,

    /// Maximum columns appended by the default sort when paging
    #[validate(range(
        min = 1,
        max = 32,
        message = "Default sort max columns must be between 1 and 32"
    ))]
    pub default_sort_max_columns: usize,

    /// Fail on filter expressions that do not parse or bind instead of
    /// matching no rows
    pub strict_filters: bool,

    /// Wrap generated SQL in marker comments
    pub dev_mode: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::Postgres,
            max_lookup_depth: 10,
            default_sort_max_columns: 5,
            strict_filters: false,
            dev_mode: false,
        }
    }
}

impl GeneratorConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            dialect: parse_env_var("VIEWSQL_DIALECT", "postgres")?,
            max_lookup_depth: parse_env_var("VIEWSQL_MAX_LOOKUP_DEPTH", "10")?,
            default_sort_max_columns: parse_env_var("VIEWSQL_DEFAULT_SORT_MAX_COLUMNS", "5")?,
            strict_filters: parse_env_var("VIEWSQL_STRICT_FILTERS", "false")?,
            dev_mode: parse_env_var("VIEWSQL_DEV_MODE", "false")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let config = Self {
            dialect: cli.dialect,
            max_lookup_depth: cli.max_lookup_depth,
            default_sort_max_columns: cli.default_sort_max_columns,
            strict_filters: cli.strict_filters,
            dev_mode: cli.dev_mode,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Merge with another configuration (the other side wins)
    pub fn merge(&mut self, other: Self) {
        self.dialect = other.dialect;
        self.max_lookup_depth = other.max_lookup_depth;
        self.default_sort_max_columns = other.default_sort_max_columns;
        self.strict_filters = other.strict_filters;
        self.dev_mode = other.dev_mode;
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub dialect: DialectKind,
    pub max_lookup_depth: usize,
    pub default_sort_max_columns: usize,
    pub strict_filters: bool,
    pub dev_mode: bool,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
