use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::catalog::SchemaCatalog;
use super::column_info::{ColumnInfo, ColumnSource, LookupSource};
use super::field_key::FieldKey;
use super::table_info::TableInfo;

/// A lookup from a column to another table's key.
///
/// The target is named by schema and table and fetched from the catalog on
/// demand, so lookup graphs may contain cycles (Users -> Groups -> Users).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub lookup_schema: String,
    pub lookup_table: String,
    /// Key column in the lookup table. Defaults to its first primary-key column.
    #[serde(default)]
    pub lookup_key: Option<String>,
    /// Columns worth selecting whenever this lookup is selected, relative to
    /// the table that declares the foreign-key column
    #[serde(default)]
    pub suggested_columns: Vec<FieldKey>,
}

impl ForeignKey {
    pub fn new(lookup_schema: impl Into<String>, lookup_table: impl Into<String>) -> Self {
        ForeignKey {
            lookup_schema: lookup_schema.into(),
            lookup_table: lookup_table.into(),
            lookup_key: None,
            suggested_columns: Vec::new(),
        }
    }

    pub fn with_lookup_key(mut self, key: impl Into<String>) -> Self {
        self.lookup_key = Some(key.into());
        self
    }

    pub fn with_suggested_columns(mut self, keys: Vec<FieldKey>) -> Self {
        self.suggested_columns = keys;
        self
    }

    pub fn lookup_table_info(&self, catalog: &SchemaCatalog) -> Option<Arc<TableInfo>> {
        catalog.table(&self.lookup_schema, &self.lookup_table)
    }

    pub fn suggested_columns(&self) -> &[FieldKey] {
        &self.suggested_columns
    }

    /// Build the column for `display_name` in the lookup table, as seen through `parent`.
    ///
    /// A blank `display_name` selects the lookup table's title column. Keys the
    /// lookup column carries (sort keys, missing-value companion, logging
    /// dependencies) are re-rooted under the parent's field key.
    pub fn create_lookup_column(
        &self,
        parent: &Arc<ColumnInfo>,
        display_name: &str,
        catalog: &SchemaCatalog,
    ) -> Option<ColumnInfo> {
        let lookup_table = self.lookup_table_info(catalog)?;
        let display = if display_name.is_empty() {
            lookup_table.title_column()?
        } else {
            lookup_table.column(display_name)?
        };
        let lookup_key = match &self.lookup_key {
            Some(name) => lookup_table.column(name)?,
            None => lookup_table.pk_columns().into_iter().next()?,
        };

        let parent_key = &parent.field_key;
        Some(ColumnInfo {
            name: display.name.clone(),
            field_key: FieldKey::new(Some(parent_key), display.name.clone()),
            alias: None,
            jdbc_type: display.jdbc_type,
            nullable: true,
            key_field: false,
            required: false,
            sortable: display.sortable,
            sort_direction: display.sort_direction,
            fk: display.fk.clone(),
            sort_field_keys: display
                .sort_field_keys
                .iter()
                .map(|k| k.rebase(parent_key))
                .collect(),
            mv_column: display.mv_column.as_ref().map(|k| k.rebase(parent_key)),
            details_url: None,
            logging: display.logging.rebase(parent_key),
            source: ColumnSource::Lookup(Box::new(LookupSource {
                fk: Arc::clone(parent),
                lookup_table: Arc::clone(&lookup_table),
                lookup_key,
                display,
            })),
        })
    }
}
