use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use super::catalog::SchemaCatalog;
use super::column_info::{ColumnInfo, ColumnLogging, JdbcType, SortDirection};
use super::errors::SchemaError;
use super::field_key::FieldKey;
use super::foreign_key::ForeignKey;
use super::table_info::TableInfo;
use crate::query::sort::Sort;

/// Schema descriptions are loaded from YAML with the following structure:
///
/// ```yaml
/// schemas:
///   - name: core
///     tables:
///       - name: Users
///         title_column: DisplayName
///         details_action: user-details.view
///         sort: "-DisplayName"            # intrinsic sort, URL form
///         columns:
///           - name: UserId
///             type: integer
///             key: true
///           - name: DisplayName
///           - name: Groups
///             type: integer
///             lookup:
///               schema: core
///               table: Groups
///               suggested_columns: [Groups/Name]
///           - name: Initials
///             expression: "substr(${TABLE}.DisplayName, 1, 2)"
/// ```
///
/// Lookups may point at tables declared later in the file or in other schemas
/// of the same file; [`SchemaConfig::validate`] checks that every target exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub schemas: Vec<SchemaDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub title_column: Option<String>,
    #[serde(default)]
    pub details_action: Option<String>,
    /// Intrinsic sort in URL form, e.g. `-Created,Name`
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub default_visible: Vec<FieldKey>,
    /// Subquery used in place of `schema.table`
    #[serde(default)]
    pub from_sql: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(default, rename = "type")]
    pub jdbc_type: JdbcType,
    #[serde(default)]
    pub alias: Option<String>,
    /// Physical column name when it differs from `name`
    #[serde(default)]
    pub physical_name: Option<String>,
    /// SQL expression over `${TABLE}`
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub key: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default = "default_true")]
    pub sortable: bool,
    #[serde(default)]
    pub sort_direction: SortDirection,
    #[serde(default)]
    pub sort_field_keys: Vec<FieldKey>,
    #[serde(default)]
    pub mv_column: Option<FieldKey>,
    #[serde(default)]
    pub details_url: Option<String>,
    #[serde(default)]
    pub lookup: Option<LookupDefinition>,
    #[serde(default)]
    pub logging: Option<ColumnLogging>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupDefinition {
    /// Defaults to the schema of the declaring table
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub suggested_columns: Vec<FieldKey>,
}

fn default_true() -> bool {
    true
}

impl SchemaConfig {
    /// Load a schema description from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| SchemaError::ConfigRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_yaml_str(&contents)
    }

    /// Parse a schema description from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SchemaError> {
        serde_yaml::from_str(yaml).map_err(|e| SchemaError::ConfigParse {
            error: e.to_string(),
        })
    }

    fn find_table(&self, schema: &str, table: &str) -> Option<&TableDefinition> {
        self.schemas
            .iter()
            .filter(|s| s.name.eq_ignore_ascii_case(schema))
            .flat_map(|s| s.tables.iter())
            .find(|t| t.name.eq_ignore_ascii_case(table))
    }

    /// Structural validation: duplicates, lookup targets, title columns
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen_tables = HashSet::new();
        for schema in &self.schemas {
            for table in &schema.tables {
                let key = (
                    schema.name.to_ascii_lowercase(),
                    table.name.to_ascii_lowercase(),
                );
                if !seen_tables.insert(key) {
                    return Err(SchemaError::DuplicateTable {
                        schema: schema.name.clone(),
                        table: table.name.clone(),
                    });
                }
                self.validate_table(&schema.name, table)?;
            }
        }
        Ok(())
    }

    fn validate_table(&self, schema: &str, table: &TableDefinition) -> Result<(), SchemaError> {
        let mut seen_columns = HashSet::new();
        for column in &table.columns {
            if !seen_columns.insert(column.name.to_ascii_lowercase()) {
                return Err(SchemaError::DuplicateColumn {
                    table: table.name.clone(),
                    column: column.name.clone(),
                });
            }
            if column.physical_name.is_some() && column.expression.is_some() {
                return Err(SchemaError::ConflictingSource {
                    table: table.name.clone(),
                    column: column.name.clone(),
                });
            }
            if let Some(lookup) = &column.lookup {
                let target_schema = lookup.schema.as_deref().unwrap_or(schema);
                let target = self.find_table(target_schema, &lookup.table).ok_or_else(|| {
                    SchemaError::UnknownLookupTable {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        target: format!("{}.{}", target_schema, lookup.table),
                    }
                })?;
                let key_ok = match &lookup.key {
                    Some(key) => target.columns.iter().any(|c| c.name.eq_ignore_ascii_case(key)),
                    None => target.columns.iter().any(|c| c.key),
                };
                if !key_ok {
                    return Err(SchemaError::UnknownLookupKey {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        target: format!("{}.{}", target_schema, lookup.table),
                        key: lookup.key.clone().unwrap_or_else(|| "<primary key>".to_string()),
                    });
                }
            }
        }
        if let Some(title) = &table.title_column {
            if !seen_columns.contains(&title.to_ascii_lowercase()) {
                return Err(SchemaError::UnknownTitleColumn {
                    table: table.name.clone(),
                    column: title.clone(),
                });
            }
        }
        Ok(())
    }

    /// Validate and register every table into `catalog`. Returns the number of tables.
    pub fn register_into(&self, catalog: &SchemaCatalog) -> Result<usize, SchemaError> {
        self.validate()?;
        let mut count = 0;
        for schema in &self.schemas {
            for table in &schema.tables {
                catalog.register(table.to_table_info(&schema.name));
                count += 1;
            }
        }
        log::info!("Registered {} tables from schema configuration", count);
        Ok(count)
    }

    pub fn into_catalog(self) -> Result<SchemaCatalog, SchemaError> {
        let catalog = SchemaCatalog::new();
        self.register_into(&catalog)?;
        Ok(catalog)
    }
}

impl TableDefinition {
    pub fn to_table_info(&self, schema: &str) -> TableInfo {
        let mut table = TableInfo::new(schema, self.name.clone());
        for column in &self.columns {
            table = table.with_column(column.to_column_info(schema));
        }
        if let Some(title) = &self.title_column {
            table = table.with_title_column(title.clone());
        }
        if let Some(action) = &self.details_action {
            table = table.with_details_action(action.clone());
        }
        if let Some(sort) = &self.sort {
            table = table.with_sort_fields(Sort::parse_url(sort).sort_list().to_vec());
        }
        if let Some(from_sql) = &self.from_sql {
            table = table.with_from_sql(from_sql.clone());
        }
        table.with_default_visible(self.default_visible.clone())
    }
}

impl ColumnDefinition {
    pub fn to_column_info(&self, schema: &str) -> ColumnInfo {
        let mut column = match &self.expression {
            Some(sql) => ColumnInfo::expression(self.name.clone(), sql.clone(), self.jdbc_type),
            None => ColumnInfo::new(self.name.clone(), self.jdbc_type),
        };
        if let Some(physical) = &self.physical_name {
            column = column.with_physical_name(physical.clone());
        }
        column.alias = self.alias.clone();
        column.key_field = self.key;
        column.required = self.required;
        column.nullable = self.nullable && !self.key;
        column.sortable = self.sortable;
        column.sort_direction = self.sort_direction;
        column.sort_field_keys = self.sort_field_keys.clone();
        column.mv_column = self.mv_column.clone();
        column.details_url = self.details_url.clone();
        column.logging = self.logging.clone().unwrap_or_default();
        column.fk = self.lookup.as_ref().map(|lookup| ForeignKey {
            lookup_schema: lookup.schema.clone().unwrap_or_else(|| schema.to_string()),
            lookup_table: lookup.table.clone(),
            lookup_key: lookup.key.clone(),
            suggested_columns: lookup.suggested_columns.clone(),
        });
        column
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS_YAML: &str = r#"
schemas:
  - name: core
    tables:
      - name: Users
        title_column: DisplayName
        sort: "-DisplayName"
        columns:
          - name: UserId
            type: integer
            key: true
          - name: DisplayName
          - name: Groups
            type: integer
            lookup:
              table: Groups
      - name: Groups
        columns:
          - name: GroupId
            type: integer
            key: true
          - name: Name
            logging:
              should_log_name: true
              data_logging_columns: [GroupId]
"#;

    #[test]
    fn test_parse_and_register() {
        let config = SchemaConfig::from_yaml_str(USERS_YAML).unwrap();
        let catalog = config.into_catalog().unwrap();
        let users = catalog.table("core", "users").unwrap();
        assert_eq!(users.columns().len(), 3);
        assert_eq!(users.pk_columns()[0].name, "UserId");
        assert_eq!(users.sort_fields.len(), 1);
        assert_eq!(users.sort_fields[0].direction, SortDirection::Descending);

        let groups_fk = users.column("Groups").unwrap().fk.clone().unwrap();
        assert_eq!(groups_fk.lookup_schema, "core");

        let groups = catalog.table("core", "Groups").unwrap();
        assert!(groups.column("Name").unwrap().logging.should_log_name);
    }

    #[test]
    fn test_unknown_lookup_table() {
        let yaml = r#"
schemas:
  - name: core
    tables:
      - name: Users
        columns:
          - name: Groups
            lookup:
              table: Nowhere
"#;
        let err = SchemaConfig::from_yaml_str(yaml).unwrap().validate().unwrap_err();
        assert!(matches!(err, SchemaError::UnknownLookupTable { .. }));
    }

    #[test]
    fn test_duplicate_column() {
        let yaml = r#"
schemas:
  - name: core
    tables:
      - name: Users
        columns:
          - name: Email
          - name: email
"#;
        let err = SchemaConfig::from_yaml_str(yaml).unwrap().validate().unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateColumn { .. }));
    }

    #[test]
    fn test_unknown_title_column() {
        let yaml = r#"
schemas:
  - name: core
    tables:
      - name: Users
        title_column: Missing
        columns:
          - name: Email
"#;
        let err = SchemaConfig::from_yaml_str(yaml).unwrap().validate().unwrap_err();
        assert!(matches!(err, SchemaError::UnknownTitleColumn { .. }));
    }

    #[test]
    fn test_parse_error() {
        let err = SchemaConfig::from_yaml_str("schemas: [").unwrap_err();
        assert!(matches!(err, SchemaError::ConfigParse { .. }));
    }
}
