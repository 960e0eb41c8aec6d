use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DialectError {
    #[error("{dialect}: limit_rows() with an offset is not supported")]
    UnsupportedPagination { dialect: String },

    #[error("{dialect}: paging with an offset requires an ORDER BY clause")]
    OrderByRequired { dialect: String },

    #[error("Malformed SELECT fragment passed to limit_rows(): {0}")]
    MalformedSelect(String),

    #[error("Unknown SQL dialect '{0}' (expected postgres, sqlserver or sqlserver2000)")]
    UnknownDialect(String),
}
