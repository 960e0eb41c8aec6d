use thiserror::Error;

use crate::dialect::DialectError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("Unable to locate required logging column '{0}'.")]
    UnresolvedLoggingColumn(String),

    #[error("Column logging is required but the query context has no user.")]
    LoggingContextMissing,

    #[error("Duplicate alias in column list: {table}.{field_key} as {alias}. This is an internal SQL generation error.")]
    DuplicateAlias {
        table: String,
        field_key: String,
        alias: String,
    },

    #[error("Named parameter '{0}' was not provided and has no default.")]
    NamedParameterNotProvided(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error(transparent)]
    Dialect(#[from] DialectError),
}
