//! SELECT generation
//!
//! Builds the SQL for reading a table through a column list, filter, sort and
//! row window:
//!
//! ```text
//! SELECT <requested aliases | *>
//! FROM (
//! SELECT
//! <value> AS <alias>, ...          -- requested + required + logging columns
//! FROM <table> <alias>
//! LEFT OUTER JOIN ...              -- one per lookup, parents first
//! ) x
//! WHERE ...
//! ORDER BY ...
//! <dialect pagination>
//! ```
//!
//! Requests with no filter, sort, limit, offset or DISTINCT skip the nesting
//! and return the inner SELECT directly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use super::alias_manager::make_legal_name;
use super::column_resolver::{ColumnMap, ColumnResolver};
use super::context::QueryContext;
use super::errors::QueryError;
use super::filter::{Filter, FilterBinding};
use super::fragment::SqlFragment;
use super::required_columns::ensure_required_columns;
use super::sort::Sort;
use crate::config::GeneratorConfig;
use crate::dialect::{MaxRows, PagedQuery, SqlDialect};
use crate::schema::{ColumnInfo, FieldKey, JoinMap, TableInfo};

/// Alias of the nested subquery that WHERE and ORDER BY apply to
const SUBQUERY_ALIAS: &str = "x";

#[derive(Debug, Clone)]
pub struct SelectRequest {
    pub table: Arc<TableInfo>,
    /// Columns to return; every table column when `None`
    pub columns: Option<Vec<Arc<ColumnInfo>>>,
    pub filter: Option<Filter>,
    pub sort: Option<Sort>,
    pub max_rows: MaxRows,
    pub offset: u64,
    /// Add a stable default sort even without pagination
    pub force_sort: bool,
    pub distinct: bool,
}

impl SelectRequest {
    pub fn new(table: Arc<TableInfo>) -> Self {
        SelectRequest {
            table,
            columns: None,
            filter: None,
            sort: None,
            max_rows: MaxRows::All,
            offset: 0,
            force_sort: false,
            distinct: false,
        }
    }

    pub fn with_columns(mut self, columns: Vec<Arc<ColumnInfo>>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_max_rows(mut self, max_rows: MaxRows) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_force_sort(mut self, force_sort: bool) -> Self {
        self.force_sort = force_sort;
        self
    }

    pub fn with_distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }
}

/// A column of the final result set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputColumn {
    pub field_key: FieldKey,
    pub alias: String,
}

/// What the audit collaborator records for a query touching logged columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryLogging {
    pub user: Option<String>,
    pub container: Option<String>,
    pub comments: Vec<String>,
    /// Columns whose reading must be recorded
    pub logged_columns: Vec<FieldKey>,
    /// Columns selected so the record identifies its subject
    pub data_logging_columns: Vec<FieldKey>,
}

impl QueryLogging {
    pub fn is_empty(&self) -> bool {
        self.logged_columns.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SelectSql {
    pub fragment: SqlFragment,
    /// Exactly the columns the caller reads back, in order
    pub output_columns: Vec<OutputColumn>,
    pub warnings: Vec<String>,
    /// Filter and sort keys that were dropped because they do not resolve
    pub unresolved: Vec<FieldKey>,
    pub logging: QueryLogging,
}

pub struct SqlGenerator {
    dialect: Arc<dyn SqlDialect>,
    config: GeneratorConfig,
}

impl SqlGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        SqlGenerator {
            dialect: config.dialect.dialect(),
            config,
        }
    }

    /// Generator over a dialect implementation other than the built-in ones
    pub fn with_dialect(config: GeneratorConfig, dialect: Arc<dyn SqlDialect>) -> Self {
        SqlGenerator { dialect, config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn dialect(&self) -> &Arc<dyn SqlDialect> {
        &self.dialect
    }

    fn resolver<'a>(&self, ctx: &'a QueryContext, table: &'a TableInfo) -> ColumnResolver<'a> {
        ColumnResolver::new(
            &ctx.catalog,
            table,
            Arc::clone(&self.dialect),
            self.config.max_lookup_depth,
        )
    }

    /// Resolve `keys` against `table`, omitting keys that do not resolve
    pub fn get_columns(
        &self,
        ctx: &QueryContext,
        table: &TableInfo,
        keys: &[FieldKey],
        existing: &[Arc<ColumnInfo>],
    ) -> Vec<(FieldKey, Arc<ColumnInfo>)> {
        self.resolver(ctx, table).get_columns(keys, existing)
    }

    pub fn get_select_sql(
        &self,
        ctx: &QueryContext,
        request: SelectRequest,
    ) -> Result<SelectSql, QueryError> {
        let SelectRequest {
            table,
            columns,
            mut filter,
            mut sort,
            max_rows,
            offset,
            force_sort,
            distinct,
        } = request;
        let dialect = self.dialect.as_ref();
        let select_columns = columns.unwrap_or_else(|| table.columns().to_vec());
        let mut resolver = self.resolver(ctx, &table);

        // Pick the default sort before computing required columns
        let has_limit = !max_rows.is_all() || offset > 0;
        if has_limit || force_sort {
            let mut paging_sort = match sort.take() {
                Some(s) if !s.is_empty() => s,
                _ => intrinsic_sort(&table),
            };
            self.append_default_sort(&mut paging_sort, &select_columns, &mut resolver);
            sort = Some(paging_sort);
        }

        let mut column_map = ColumnMap::new();
        let required = ensure_required_columns(
            &mut resolver,
            &select_columns,
            filter.as_mut(),
            sort.as_mut(),
            &mut column_map,
        );
        let mut all_columns = required.columns;
        let logging = logging_pass(
            ctx,
            &mut resolver,
            &required.involved,
            &mut all_columns,
            &mut column_map,
        )?;

        // Filters and sorts may name any table column
        for column in table.columns() {
            column_map
                .entry(column.field_key.clone())
                .or_insert_with(|| Arc::clone(column));
        }

        let selected_keys: HashSet<&FieldKey> =
            select_columns.iter().map(|c| &c.field_key).collect();
        let requires_extra_columns = all_columns
            .iter()
            .any(|c| !selected_keys.contains(&c.field_key));
        let table_alias = make_legal_name(&table.name, dialect);

        let mut joins = JoinMap::new();
        let select = inner_select(&table, &all_columns, &table_alias, dialect, &mut joins)?;

        let mut from = format!("FROM {} ", table.from_sql(&table_alias, dialect));
        for (_, join) in joins.iter() {
            from.push('\n');
            from.push_str(join);
        }

        let mut warnings = Vec::new();
        let filter_fragment = match &filter {
            Some(filter) => filter.sql_fragment(
                &FilterBinding {
                    dialect,
                    columns: &column_map,
                    table_alias: Some(SUBQUERY_ALIAS),
                    strict: self.config.strict_filters,
                },
                &mut warnings,
            )?,
            None => None,
        };
        let order_by = sort
            .as_ref()
            .and_then(|s| s.order_by_clause(dialect, &column_map, None));

        let no_filter = filter_fragment.as_ref().map_or(true, |f| f.is_empty());
        let mut fragment = if no_filter
            && order_by.is_none()
            && max_rows.is_all()
            && offset == 0
            && !distinct
        {
            SqlFragment::from_sql(format!("{}\n{}", select, from))
        } else {
            let outer = outer_select(&select_columns, requires_extra_columns, distinct, dialect);
            let nested_from = format!("FROM (\n{}\n{}) {}", select, from, SUBQUERY_ALIAS);
            dialect.limit_rows(PagedQuery {
                select: SqlFragment::from_sql(outer),
                from: SqlFragment::from_sql(nested_from),
                filter: filter_fragment,
                order_by,
                group_by: None,
                max_rows,
                offset,
            })?
        };

        if self.config.dev_mode {
            let open = dialect.comment(&format!("<getSelectSQL({})>", table_alias));
            fragment.insert_sql(0, &format!("{}\n", open));
            fragment.append("\n");
            fragment.append(&dialect.comment("</getSelectSQL()>"));
        }

        log::debug!(
            "Generated SELECT over {}.{}: {} columns, {} joins",
            table.schema,
            table.name,
            all_columns.len(),
            joins.len()
        );

        Ok(SelectSql {
            fragment,
            output_columns: select_columns
                .iter()
                .map(|c| OutputColumn {
                    field_key: c.field_key.clone(),
                    alias: c.alias().to_string(),
                })
                .collect(),
            warnings,
            unresolved: required.unresolved,
            logging,
        })
    }

    /// Extend `sort` toward a stable order: key columns first, otherwise (when
    /// the sort is still empty) the first sortable columns
    fn append_default_sort(
        &self,
        sort: &mut Sort,
        columns: &[Arc<ColumnInfo>],
        resolver: &mut ColumnResolver<'_>,
    ) {
        if !self.add_sortable_columns(sort, columns, resolver, true) && sort.is_empty() {
            self.add_sortable_columns(sort, columns, resolver, false);
        }
    }

    fn add_sortable_columns(
        &self,
        sort: &mut Sort,
        columns: &[Arc<ColumnInfo>],
        resolver: &mut ColumnResolver<'_>,
        key_columns_only: bool,
    ) -> bool {
        let available: ColumnMap = columns
            .iter()
            .map(|c| (c.field_key.clone(), Arc::clone(c)))
            .collect();
        let mut added = false;

        for column in columns {
            if key_columns_only && !column.key_field {
                continue;
            }
            if !can_sort(column, &available, resolver) || sort.contains(&column.field_key) {
                continue;
            }
            sort.append_sort_column(column.field_key.clone(), column.sort_direction, false);
            added = true;
            if sort.sort_list().len() >= self.config.default_sort_max_columns {
                break;
            }
        }
        added
    }
}

/// The table's declared sort, limited to its own columns
fn intrinsic_sort(table: &TableInfo) -> Sort {
    let mut sort = Sort::new();
    for field in &table.sort_fields {
        if field.field_key.parent().is_some() {
            continue;
        }
        if let Some(column) = table.column(field.field_key.name()) {
            sort.append_sort_column(column.field_key.clone(), field.direction, false);
        }
    }
    sort
}

/// A column is a default-sort candidate if its sort keys all resolve, or
/// failing that, if it is sortable itself
fn can_sort(
    column: &ColumnInfo,
    available: &ColumnMap,
    resolver: &mut ColumnResolver<'_>,
) -> bool {
    let keys = &column.sort_field_keys;
    if !keys.is_empty() {
        if keys.iter().all(|k| available.contains_key(k)) {
            return true;
        }
        let mut scratch = available.clone();
        if keys.iter().all(|k| resolver.resolve(k, &mut scratch).is_some()) {
            return true;
        }
    }
    column.sortable
}

/// Collect audit requirements of the involved columns and splice their
/// data-logging dependencies into `all_columns`
fn logging_pass(
    ctx: &QueryContext,
    resolver: &mut ColumnResolver<'_>,
    involved: &[Arc<ColumnInfo>],
    all_columns: &mut Vec<Arc<ColumnInfo>>,
    column_map: &mut ColumnMap,
) -> Result<QueryLogging, QueryError> {
    let mut logging = QueryLogging::default();

    for column in involved.iter().filter(|c| c.logging.should_log_name) {
        if !logging.logged_columns.contains(&column.field_key) {
            logging.logged_columns.push(column.field_key.clone());
        }
        if let Some(comment) = &column.logging.comment {
            if !logging.comments.contains(comment) {
                logging.comments.push(comment.clone());
            }
        }
        for key in &column.logging.data_logging_columns {
            let dependency = resolver
                .resolve(key, column_map)
                .ok_or_else(|| QueryError::UnresolvedLoggingColumn(key.to_string()))?;
            if !all_columns.iter().any(|c| c.field_key == dependency.field_key) {
                all_columns.push(Arc::clone(&dependency));
            }
            if !logging.data_logging_columns.contains(&dependency.field_key) {
                logging.data_logging_columns.push(dependency.field_key.clone());
            }
        }
    }

    if logging.is_empty() {
        return Ok(logging);
    }
    let Some(user) = ctx.user.as_ref() else {
        return Err(QueryError::LoggingContextMissing);
    };
    logging.user = Some(user.clone());
    logging.container = ctx.container.clone();
    log::debug!(
        "Query logging required for {:?} (data columns {:?})",
        logging.logged_columns,
        logging.data_logging_columns
    );
    Ok(logging)
}

/// `SELECT` list of every column, one entry per alias
fn inner_select(
    table: &TableInfo,
    columns: &[Arc<ColumnInfo>],
    table_alias: &str,
    dialect: &dyn SqlDialect,
    joins: &mut JoinMap,
) -> Result<String, QueryError> {
    let mut select = String::from("SELECT ");
    if columns.is_empty() {
        select.push_str("* ");
        return Ok(select);
    }

    let mut aliases: HashMap<String, &Arc<ColumnInfo>> = HashMap::new();
    let mut separator = "\n";
    for column in columns {
        let alias_key = column.alias().to_ascii_lowercase();
        if let Some(previous) = aliases.get(&alias_key) {
            if previous.field_key != column.field_key {
                let error = QueryError::DuplicateAlias {
                    table: format!("{}.{}", table.schema, table.name),
                    field_key: column.field_key.to_string(),
                    alias: column.alias().to_string(),
                };
                log::error!("{}", error);
                return Err(error);
            }
            continue;
        }
        aliases.insert(alias_key, column);

        column.declare_joins(table_alias, dialect, joins);
        select.push_str(separator);
        select.push_str(&column.value_sql(table_alias, dialect));
        select.push_str(" AS ");
        select.push_str(&dialect.make_legal_identifier(column.alias()));
        separator = ",\n";
    }
    Ok(select)
}

fn outer_select(
    select_columns: &[Arc<ColumnInfo>],
    requires_extra_columns: bool,
    distinct: bool,
    dialect: &dyn SqlDialect,
) -> String {
    if !(requires_extra_columns || distinct) || select_columns.is_empty() {
        return if distinct {
            "SELECT DISTINCT *".to_string()
        } else {
            "SELECT *".to_string()
        };
    }
    let names: Vec<String> = select_columns
        .iter()
        .map(|c| dialect.make_legal_identifier(c.alias()))
        .collect();
    format!(
        "SELECT {}{}",
        if distinct { "DISTINCT " } else { "" },
        names.join(", ")
    )
}
