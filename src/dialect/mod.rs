//! SQL dialects
//!
//! A dialect owns everything that differs between database engines for the
//! SELECT statements this crate emits: identifier legality and quoting,
//! reserved words, the string concatenation operator, boolean literals and
//! the pagination primitive ([`SqlDialect::limit_rows`]).
//!
//! Pagination strategies:
//! - PostgreSQL: `LIMIT n OFFSET m`
//! - SQL Server: `TOP n`, or `ROW_NUMBER() OVER (ORDER BY ...)` when an offset is requested
//! - SQL Server 2000: `TOP n` only; an offset is a capability failure

pub mod errors;
pub mod postgres;
pub mod sqlserver;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::query::fragment::SqlFragment;

pub use errors::DialectError;
pub use postgres::PostgresDialect;
pub use sqlserver::{SqlServer2000Dialect, SqlServerDialect};

static LEGAL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// True for names usable as unquoted SQL identifiers (ignoring reserved words)
pub fn is_legal_name(name: &str) -> bool {
    LEGAL_NAME.is_match(name)
}

/// Row limit requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxRows {
    /// No limit
    #[default]
    All,
    /// Return the shape of the result but no rows
    NoRows,
    /// At most this many rows
    Limit(u64),
}

impl MaxRows {
    pub fn is_all(&self) -> bool {
        matches!(self, MaxRows::All)
    }
}

/// The pieces a dialect needs to compose a paged SELECT.
///
/// `select` starts with `SELECT`, `from` with `FROM`, `filter` with `WHERE`
/// and `order_by` with `ORDER BY`. Parameters are taken in that order.
#[derive(Debug, Clone, Default)]
pub struct PagedQuery {
    pub select: SqlFragment,
    pub from: SqlFragment,
    pub filter: Option<SqlFragment>,
    pub order_by: Option<String>,
    pub group_by: Option<String>,
    pub max_rows: MaxRows,
    pub offset: u64,
}

#[cfg_attr(test, mockall::automock)]
pub trait SqlDialect: Send + Sync {
    fn kind(&self) -> DialectKind;

    /// Case-insensitive reserved word check
    fn is_reserved(&self, word: &str) -> bool;

    fn max_identifier_length(&self) -> usize;

    fn concatenation_operator(&self) -> &'static str;

    fn supports_offset(&self) -> bool;

    fn boolean_literal(&self, value: bool) -> &'static str;

    /// Compose SELECT / FROM / WHERE / GROUP BY / ORDER BY with the row limit and offset
    fn limit_rows(&self, query: PagedQuery) -> Result<SqlFragment, DialectError>;

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Leave legal, non-reserved names bare and quote everything else
    fn make_legal_identifier(&self, name: &str) -> String {
        if is_legal_name(name) && !self.is_reserved(name) {
            name.to_string()
        } else {
            self.quote_identifier(name)
        }
    }

    fn comment(&self, text: &str) -> String {
        format!("/* {} */", text.replace("*/", "* /"))
    }
}

impl fmt::Debug for dyn SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SqlDialect({})", self.kind())
    }
}

/// Supported dialects, selectable from config files, env vars and the CLI
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    Postgres,
    #[value(name = "sqlserver")]
    SqlServer,
    #[value(name = "sqlserver2000")]
    SqlServer2000,
}

impl DialectKind {
    pub fn dialect(self) -> Arc<dyn SqlDialect> {
        match self {
            DialectKind::Postgres => Arc::new(PostgresDialect),
            DialectKind::SqlServer => Arc::new(SqlServerDialect),
            DialectKind::SqlServer2000 => Arc::new(SqlServer2000Dialect),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DialectKind::Postgres => "postgres",
            DialectKind::SqlServer => "sqlserver",
            DialectKind::SqlServer2000 => "sqlserver2000",
        }
    }

    pub fn is_sql_server(&self) -> bool {
        matches!(self, DialectKind::SqlServer | DialectKind::SqlServer2000)
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = DialectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DialectKind::Postgres),
            "sqlserver" | "mssql" => Ok(DialectKind::SqlServer),
            "sqlserver2000" | "mssql2000" => Ok(DialectKind::SqlServer2000),
            _ => Err(DialectError::UnknownDialect(s.to_string())),
        }
    }
}

/// Render the WHERE / GROUP BY / ORDER BY tail shared by the dialects
pub(crate) fn append_clauses(
    out: &mut SqlFragment,
    filter: Option<&SqlFragment>,
    group_by: Option<&str>,
    order_by: Option<&str>,
) {
    if let Some(filter) = filter.filter(|f| !f.is_empty()) {
        out.append("\n");
        out.append_fragment(filter);
    }
    if let Some(group_by) = group_by.filter(|g| !g.is_empty()) {
        out.append("\n");
        out.append(group_by);
    }
    if let Some(order_by) = order_by.filter(|o| !o.is_empty()) {
        out.append("\n");
        out.append(order_by);
    }
}
