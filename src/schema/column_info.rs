//! Column metadata
//!
//! A [`ColumnInfo`] knows how to render its value for a given table alias and
//! which joins that rendering depends on. Lookup columns (reached through a
//! foreign key) render against the alias of their LEFT OUTER JOIN, and declare
//! the joins of their whole lookup chain.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::field_key::FieldKey;
use super::foreign_key::ForeignKey;
use super::table_info::TableInfo;
use crate::dialect::SqlDialect;
use crate::query::alias_manager::make_legal_name;

/// JDBC-like column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JdbcType {
    Integer,
    BigInt,
    Decimal,
    Double,
    #[default]
    Varchar,
    Text,
    Boolean,
    Date,
    Timestamp,
    Guid,
}

impl JdbcType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            JdbcType::Integer | JdbcType::BigInt | JdbcType::Decimal | JdbcType::Double
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self, JdbcType::Varchar | JdbcType::Text | JdbcType::Guid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(alias = "asc", alias = "ASC")]
    Ascending,
    #[serde(alias = "desc", alias = "DESC")]
    Descending,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }

    pub fn url_prefix(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "",
            SortDirection::Descending => "-",
        }
    }

    pub fn reverse(&self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Audit logging metadata for a column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnLogging {
    /// Reading this column must be recorded
    #[serde(default)]
    pub should_log_name: bool,
    /// Columns that must be selected alongside, so the record identifies the subject
    #[serde(default)]
    pub data_logging_columns: Vec<FieldKey>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl ColumnLogging {
    /// Move dependency keys under `parent` when a column is lifted into a lookup
    pub fn rebase(&self, parent: &FieldKey) -> ColumnLogging {
        ColumnLogging {
            should_log_name: self.should_log_name,
            data_logging_columns: self
                .data_logging_columns
                .iter()
                .map(|k| k.rebase(parent))
                .collect(),
            comment: self.comment.clone(),
        }
    }
}

/// A column reached through a foreign key
#[derive(Debug, Clone)]
pub struct LookupSource {
    /// The foreign-key column in the parent table
    pub fk: Arc<ColumnInfo>,
    pub lookup_table: Arc<TableInfo>,
    pub lookup_key: Arc<ColumnInfo>,
    /// The column of the lookup table whose value this column shows
    pub display: Arc<ColumnInfo>,
}

impl LookupSource {
    /// Alias of the joined lookup table, unique per foreign-key path
    pub fn join_alias(&self, base_alias: &str, dialect: &dyn SqlDialect) -> String {
        make_legal_name(&format!("{}${}", base_alias, self.fk.alias()), dialect)
    }
}

/// Where a column's value comes from
#[derive(Debug, Clone)]
pub enum ColumnSource {
    /// A physical column of the table
    Physical(String),
    /// An SQL expression; `${TABLE}` is replaced with the table alias
    Expression(String),
    Lookup(Box<LookupSource>),
}

#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub field_key: FieldKey,
    /// Explicit SQL alias. Columns without one use their name.
    pub alias: Option<String>,
    pub jdbc_type: JdbcType,
    pub nullable: bool,
    pub key_field: bool,
    pub required: bool,
    pub sortable: bool,
    pub sort_direction: SortDirection,
    pub fk: Option<ForeignKey>,
    /// Columns to order by in place of this one
    pub sort_field_keys: Vec<FieldKey>,
    /// Missing-value indicator companion column
    pub mv_column: Option<FieldKey>,
    pub details_url: Option<String>,
    pub logging: ColumnLogging,
    pub source: ColumnSource,
}

impl ColumnInfo {
    /// A physical column named `name`
    pub fn new(name: impl Into<String>, jdbc_type: JdbcType) -> Self {
        let name = name.into();
        ColumnInfo {
            field_key: FieldKey::from_name(name.clone()),
            source: ColumnSource::Physical(name.clone()),
            name,
            alias: None,
            jdbc_type,
            nullable: true,
            key_field: false,
            required: false,
            sortable: true,
            sort_direction: SortDirection::Ascending,
            fk: None,
            sort_field_keys: Vec::new(),
            mv_column: None,
            details_url: None,
            logging: ColumnLogging::default(),
        }
    }

    /// A computed column; `sql` may reference `${TABLE}`
    pub fn expression(name: impl Into<String>, sql: impl Into<String>, jdbc_type: JdbcType) -> Self {
        let mut column = ColumnInfo::new(name, jdbc_type);
        column.source = ColumnSource::Expression(sql.into());
        column
    }

    pub fn with_physical_name(mut self, physical: impl Into<String>) -> Self {
        self.source = ColumnSource::Physical(physical.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_key_field(mut self) -> Self {
        self.key_field = true;
        self.nullable = false;
        self
    }

    pub fn with_required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_fk(mut self, fk: ForeignKey) -> Self {
        self.fk = Some(fk);
        self
    }

    pub fn with_sort_field_keys(mut self, keys: Vec<FieldKey>) -> Self {
        self.sort_field_keys = keys;
        self
    }

    pub fn with_mv_column(mut self, key: FieldKey) -> Self {
        self.mv_column = Some(key);
        self
    }

    pub fn with_logging(mut self, logging: ColumnLogging) -> Self {
        self.logging = logging;
        self
    }

    /// The SQL alias this column is selected as
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_lookup(&self) -> bool {
        matches!(self.source, ColumnSource::Lookup(_))
    }

    /// A copy of this column known under a different key and alias
    pub fn aliased(&self, field_key: FieldKey, alias: String) -> ColumnInfo {
        let mut column = self.clone();
        column.field_key = field_key;
        column.alias = Some(alias);
        column
    }

    /// SQL for this column's value relative to `table_alias`
    pub fn value_sql(&self, table_alias: &str, dialect: &dyn SqlDialect) -> String {
        match &self.source {
            ColumnSource::Physical(physical) => {
                format!("{}.{}", table_alias, dialect.make_legal_identifier(physical))
            }
            ColumnSource::Expression(sql) => sql.replace("${TABLE}", table_alias),
            ColumnSource::Lookup(lookup) => {
                let join_alias = lookup.join_alias(table_alias, dialect);
                lookup.display.value_sql(&join_alias, dialect)
            }
        }
    }

    /// Register every join this column's value depends on, parents first
    pub fn declare_joins(&self, table_alias: &str, dialect: &dyn SqlDialect, joins: &mut JoinMap) {
        let ColumnSource::Lookup(lookup) = &self.source else {
            return;
        };
        lookup.fk.declare_joins(table_alias, dialect, joins);

        let join_alias = lookup.join_alias(table_alias, dialect);
        if !joins.contains(&join_alias) {
            let sql = format!(
                "LEFT OUTER JOIN {} ON {} = {}",
                lookup.lookup_table.from_sql(&join_alias, dialect),
                lookup.fk.value_sql(table_alias, dialect),
                lookup.lookup_key.value_sql(&join_alias, dialect)
            );
            joins.insert(join_alias.clone(), sql);
        }

        lookup.display.declare_joins(&join_alias, dialect, joins);
    }
}

/// Join fragments keyed by join alias, in declaration order
#[derive(Debug, Clone, Default)]
pub struct JoinMap {
    entries: Vec<(String, String)>,
}

impl JoinMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.iter().any(|(a, _)| a.eq_ignore_ascii_case(alias))
    }

    /// Returns false if the alias was already declared
    pub fn insert(&mut self, alias: String, sql: String) -> bool {
        if self.contains(&alias) {
            return false;
        }
        self.entries.push((alias, sql));
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(a, s)| (a.as_str(), s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
