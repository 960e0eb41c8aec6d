use std::sync::Arc;

use super::column_info::ColumnInfo;
use super::field_key::FieldKey;
use crate::dialect::SqlDialect;
use crate::query::sort::SortField;

pub const CONTAINER_COLUMN: &str = "Container";

/// Read-only table metadata
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    columns: Vec<Arc<ColumnInfo>>,
    title_column: Option<String>,
    /// Action that shows one row; title columns link to it
    pub details_action: Option<String>,
    /// Intrinsic ordering used when paging without an explicit sort
    pub sort_fields: Vec<SortField>,
    pub default_visible: Vec<FieldKey>,
    /// Subquery text used in place of `schema.table`
    pub from_sql_override: Option<String>,
}

impl TableInfo {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        TableInfo {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            title_column: None,
            details_action: None,
            sort_fields: Vec::new(),
            default_visible: Vec::new(),
            from_sql_override: None,
        }
    }

    pub fn with_column(mut self, mut column: ColumnInfo) -> Self {
        column.field_key = FieldKey::from_name(column.name.clone());
        self.columns.push(Arc::new(column));
        self
    }

    pub fn with_title_column(mut self, name: impl Into<String>) -> Self {
        self.title_column = Some(name.into());
        self
    }

    pub fn with_details_action(mut self, action: impl Into<String>) -> Self {
        self.details_action = Some(action.into());
        self
    }

    pub fn with_sort_fields(mut self, sort_fields: Vec<SortField>) -> Self {
        self.sort_fields = sort_fields;
        self
    }

    pub fn with_default_visible(mut self, keys: Vec<FieldKey>) -> Self {
        self.default_visible = keys;
        self
    }

    pub fn with_from_sql(mut self, sql: impl Into<String>) -> Self {
        self.from_sql_override = Some(sql.into());
        self
    }

    pub fn columns(&self) -> &[Arc<ColumnInfo>] {
        &self.columns
    }

    /// Case-insensitive lookup by column name
    pub fn column(&self, name: &str) -> Option<Arc<ColumnInfo>> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn column_by_alias(&self, alias: &str) -> Option<Arc<ColumnInfo>> {
        self.columns
            .iter()
            .find(|c| c.alias().eq_ignore_ascii_case(alias))
            .cloned()
    }

    pub fn pk_columns(&self) -> Vec<Arc<ColumnInfo>> {
        self.columns.iter().filter(|c| c.key_field).cloned().collect()
    }

    /// Explicit title column, else the first non-key text column, else the first column
    pub fn title_column(&self) -> Option<Arc<ColumnInfo>> {
        if let Some(name) = &self.title_column {
            return self.column(name);
        }
        self.columns
            .iter()
            .find(|c| !c.key_field && c.jdbc_type.is_text())
            .or_else(|| self.columns.first())
            .cloned()
    }

    pub fn is_title_column(&self, column: &ColumnInfo) -> bool {
        self.title_column()
            .is_some_and(|t| t.name.eq_ignore_ascii_case(&column.name))
    }

    pub fn container_column(&self) -> Option<Arc<ColumnInfo>> {
        self.column(CONTAINER_COLUMN)
    }

    /// `details.view?UserId=${UserId}` for the primary key, if the table has a details action
    pub fn details_url(&self) -> Option<String> {
        let action = self.details_action.as_ref()?;
        let pks = self.pk_columns();
        if pks.is_empty() {
            return None;
        }
        let params: Vec<String> = pks
            .iter()
            .map(|pk| format!("{0}=${{{0}}}", pk.name))
            .collect();
        Some(format!("{}?{}", action, params.join("&")))
    }

    /// Default-visible columns, or every column when none are declared
    pub fn default_visible_columns(&self) -> Vec<FieldKey> {
        if self.default_visible.is_empty() {
            self.columns.iter().map(|c| c.field_key.clone()).collect()
        } else {
            self.default_visible.clone()
        }
    }

    /// FROM-clause item for this table under `alias`
    pub fn from_sql(&self, alias: &str, dialect: &dyn SqlDialect) -> String {
        match &self.from_sql_override {
            Some(sql) => format!("({}) {}", sql, alias),
            None => format!(
                "{}.{} {}",
                dialect.make_legal_identifier(&self.schema),
                dialect.make_legal_identifier(&self.name),
                alias
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::PostgresDialect;
    use crate::schema::column_info::JdbcType;

    fn users() -> TableInfo {
        TableInfo::new("core", "Users")
            .with_column(ColumnInfo::new("UserId", JdbcType::Integer).with_key_field())
            .with_column(ColumnInfo::new("DisplayName", JdbcType::Varchar))
            .with_column(ColumnInfo::new("Email", JdbcType::Varchar))
            .with_details_action("user-details.view")
    }

    #[test]
    fn test_column_lookup_ignores_case() {
        let table = users();
        assert_eq!(table.column("displayname").unwrap().name, "DisplayName");
        assert!(table.column("Missing").is_none());
    }

    #[test]
    fn test_implicit_title_column() {
        assert_eq!(users().title_column().unwrap().name, "DisplayName");
        let table = users().with_title_column("Email");
        assert_eq!(table.title_column().unwrap().name, "Email");
    }

    #[test]
    fn test_details_url_from_pk() {
        assert_eq!(
            users().details_url().as_deref(),
            Some("user-details.view?UserId=${UserId}")
        );
    }

    #[test]
    fn test_from_sql() {
        let table = users();
        assert_eq!(table.from_sql("Users", &PostgresDialect), "core.Users Users");
        let table = table.with_from_sql("SELECT * FROM core.Users WHERE Active");
        assert_eq!(
            table.from_sql("u", &PostgresDialect),
            "(SELECT * FROM core.Users WHERE Active) u"
        );
    }

    #[test]
    fn test_default_visible_falls_back_to_all() {
        let table = users();
        assert_eq!(table.default_visible_columns().len(), 3);
        let table = table.with_default_visible(vec![FieldKey::from_name("Email")]);
        assert_eq!(table.default_visible_columns(), vec![FieldKey::from_name("Email")]);
    }
}
