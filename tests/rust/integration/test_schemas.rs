//! Shared schema fixtures for integration tests

use std::sync::Arc;

use viewsql::query::QueryContext;
use viewsql::schema::{SchemaCatalog, SchemaConfig};

/// Users and Groups with a lookup cycle (Users -> Groups -> Users), a
/// suggested column, a sort substitute and an audited column.
pub const DIRECTORY_YAML: &str = r#"
schemas:
  - name: core
    tables:
      - name: Users
        title_column: DisplayName
        columns:
          - name: UserId
            type: integer
            key: true
          - name: DisplayName
          - name: Email
            logging:
              should_log_name: true
              data_logging_columns: [UserId]
              comment: email address
          - name: Groups
            type: integer
            lookup:
              table: Groups
              suggested_columns: [Groups/Code]
      - name: Groups
        title_column: Name
        columns:
          - name: GroupId
            type: integer
            key: true
          - name: Name
            sort_field_keys: [Rank]
          - name: Code
          - name: Rank
            type: integer
          - name: Owner
            type: integer
            lookup:
              table: Users
"#;

pub fn catalog() -> SchemaCatalog {
    SchemaConfig::from_yaml_str(DIRECTORY_YAML)
        .expect("fixture schema parses")
        .into_catalog()
        .expect("fixture schema registers")
}

pub fn context() -> QueryContext {
    QueryContext::new(Arc::new(catalog()))
}
