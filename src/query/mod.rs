//! Field-key resolution and SQL generation
//!
//! [`ColumnResolver`] turns field keys into resolved columns (creating lookup
//! columns across foreign keys), [`ensure_required_columns`] closes a
//! selection over everything the statement needs, and [`SqlGenerator`]
//! assembles the final SELECT for a [`SelectRequest`].

pub mod alias_manager;
pub mod column_resolver;
pub mod context;
pub mod errors;
pub mod filter;
pub mod fragment;
pub mod required_columns;
pub mod select_generator;
pub mod sort;

pub use alias_manager::{make_legal_name, AliasManager};
pub use column_resolver::{ColumnMap, ColumnResolver, Resolution};
pub use context::QueryContext;
pub use errors::QueryError;
pub use filter::{CompareType, Filter, FilterBinding, FilterClause};
pub use fragment::{
    bind_named_parameters, validate_named_parameters, NamedParameter, SqlFragment, SqlParam,
};
pub use required_columns::{ensure_required_columns, RequiredColumns};
pub use select_generator::{
    OutputColumn, QueryLogging, SelectRequest, SelectSql, SqlGenerator,
};
pub use sort::{Sort, SortField};
