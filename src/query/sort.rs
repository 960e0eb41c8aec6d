/// Sort model
///
/// URL form: comma-separated field keys, `-` prefix for descending,
/// e.g. `-Created,Groups/Name`.
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::column_resolver::ColumnMap;
use crate::dialect::SqlDialect;
use crate::schema::{ColumnInfo, FieldKey};

pub use crate::schema::SortDirection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field_key: FieldKey,
    pub direction: SortDirection,
}

impl SortField {
    pub fn new(field_key: FieldKey, direction: SortDirection) -> Self {
        SortField {
            field_key,
            direction,
        }
    }

    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (direction, key) = match text.strip_prefix('-') {
            Some(rest) => (SortDirection::Descending, rest.trim()),
            None => (SortDirection::Ascending, text.strip_prefix('+').unwrap_or(text).trim()),
        };
        if key.is_empty() {
            None
        } else {
            Some(SortField::new(FieldKey::from_string(key), direction))
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.direction.url_prefix(), self.field_key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    fields: Vec<SortField>,
}

impl Sort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Vec<SortField>) -> Self {
        Sort { fields }
    }

    /// Parse the URL form; empty entries are skipped
    pub fn parse_url(text: &str) -> Self {
        Sort {
            fields: text.split(',').filter_map(SortField::parse).collect(),
        }
    }

    pub fn to_url_string(&self) -> String {
        self.fields
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn sort_list(&self) -> &[SortField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, key: &FieldKey) -> bool {
        self.fields.iter().any(|f| &f.field_key == key)
    }

    /// Append a field. With `unique`, an existing entry for the key is replaced
    /// instead and the field moves to the end.
    pub fn append_sort_column(&mut self, key: FieldKey, direction: SortDirection, unique: bool) {
        if unique {
            self.fields.retain(|f| f.field_key != key);
        }
        self.fields.push(SortField::new(key, direction));
    }

    /// Insert fields ahead of the current ones, skipping keys already present
    pub fn insert_sort(&mut self, other: &Sort) {
        let mut fields: Vec<SortField> = other
            .fields
            .iter()
            .filter(|f| !self.contains(&f.field_key))
            .cloned()
            .collect();
        fields.append(&mut self.fields);
        self.fields = fields;
    }

    /// Remove every entry for `key`. Returns true if anything was removed.
    pub fn delete_sort_column(&mut self, key: &FieldKey) -> bool {
        let before = self.fields.len();
        self.fields.retain(|f| &f.field_key != key);
        before != self.fields.len()
    }

    /// `ORDER BY` over the aliases of resolved columns.
    ///
    /// Each field expands to its column's sort field keys (or the column itself),
    /// preceded by its missing-value companion. Fields absent from `columns` and
    /// repeated aliases are skipped. Returns `None` when nothing is left.
    pub fn order_by_clause(
        &self,
        dialect: &dyn SqlDialect,
        columns: &ColumnMap,
        table_alias: Option<&str>,
    ) -> Option<String> {
        let mut seen = HashSet::new();
        let mut terms = Vec::new();

        for field in &self.fields {
            let Some(column) = columns.get(&field.field_key) else {
                log::debug!("Skipping sort on unresolved column {}", field.field_key);
                continue;
            };
            for sort_column in expand_sort_columns(column, columns) {
                let alias = sort_column.alias().to_ascii_lowercase();
                if !seen.insert(alias) {
                    continue;
                }
                let ident = dialect.make_legal_identifier(sort_column.alias());
                let term = match table_alias {
                    Some(t) => format!("{}.{} {}", t, ident, field.direction.sql()),
                    None => format!("{} {}", ident, field.direction.sql()),
                };
                terms.push(term);
            }
        }

        if terms.is_empty() {
            None
        } else {
            Some(format!("ORDER BY {}", terms.join(", ")))
        }
    }
}

fn expand_sort_columns(column: &Arc<ColumnInfo>, columns: &ColumnMap) -> Vec<Arc<ColumnInfo>> {
    let mut result = Vec::new();
    if let Some(mv) = column.mv_column.as_ref().and_then(|k| columns.get(k)) {
        result.push(Arc::clone(mv));
    }
    let substitutes: Vec<Arc<ColumnInfo>> = column
        .sort_field_keys
        .iter()
        .filter_map(|k| columns.get(k).cloned())
        .collect();
    if substitutes.is_empty() {
        result.push(Arc::clone(column));
    } else {
        result.extend(substitutes);
    }
    result
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url_string())
    }
}
