use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("Failed to read schema file {path}: {error}")]
    ConfigRead { path: String, error: String },
    #[error("Failed to parse schema configuration: {error}")]
    ConfigParse { error: String },
    #[error("Table `{schema}.{table}` is declared more than once")]
    DuplicateTable { schema: String, table: String },
    #[error("Column `{column}` is declared more than once in table `{table}`")]
    DuplicateColumn { table: String, column: String },
    #[error("Column `{column}` of table `{table}` cannot be both physical and an expression")]
    ConflictingSource { table: String, column: String },
    #[error("Lookup from `{table}.{column}` targets unknown table `{target}`")]
    UnknownLookupTable {
        table: String,
        column: String,
        target: String,
    },
    #[error("Lookup from `{table}.{column}` targets `{target}`, which has no key column `{key}`")]
    UnknownLookupKey {
        table: String,
        column: String,
        target: String,
        key: String,
    },
    #[error("Title column `{column}` not found in table `{table}`")]
    UnknownTitleColumn { table: String, column: String },
}
