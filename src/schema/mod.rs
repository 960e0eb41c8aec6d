//! Schema model: field keys, tables, columns and lookups
//!
//! Everything here is read-only during SQL generation. Tables live in a
//! [`SchemaCatalog`] and are shared as `Arc<TableInfo>`.

pub mod catalog;
pub mod column_info;
pub mod config;
pub mod errors;
pub mod field_key;
pub mod foreign_key;
pub mod table_info;

pub use catalog::{Invalidation, SchemaCatalog};
pub use column_info::{
    ColumnInfo, ColumnLogging, ColumnSource, JdbcType, JoinMap, LookupSource, SortDirection,
};
pub use config::SchemaConfig;
pub use errors::SchemaError;
pub use field_key::FieldKey;
pub use foreign_key::ForeignKey;
pub use table_info::TableInfo;
