//! viewsql - field-key resolution and SELECT generation over a lookup-aware schema
//!
//! This crate turns dialect-neutral column references into physical SQL:
//! - Field keys that traverse foreign-key lookups (`Groups/Owner/Name`)
//! - Required-column closure for joins, sorting and audit logging
//! - Ad hoc filter expressions parsed and bound against resolved columns
//! - Pagination over PostgreSQL and SQL Server dialects

pub mod config;
pub mod dialect;
pub mod expression;
pub mod query;
pub mod schema;

pub use config::GeneratorConfig;
pub use dialect::{DialectKind, MaxRows, SqlDialect};
pub use query::{
    bind_named_parameters, validate_named_parameters, QueryContext, QueryError, SelectRequest,
    SelectSql, SqlFragment, SqlGenerator,
};
pub use schema::{ColumnInfo, FieldKey, ForeignKey, SchemaCatalog, TableInfo};
