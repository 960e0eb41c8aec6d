//! Field key resolution
//!
//! Maps a [`FieldKey`] onto a [`ColumnInfo`] of the root table, walking
//! foreign keys for multi-segment keys. Results are memoized in a per-call
//! [`ColumnMap`], so resolving the same key twice yields the same `Arc` and
//! therefore the same alias and JOIN text.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dialect::SqlDialect;
use crate::schema::{ColumnInfo, FieldKey, SchemaCatalog, TableInfo};

use super::alias_manager::{is_legal_name, AliasManager};

pub type ColumnMap = HashMap<FieldKey, Arc<ColumnInfo>>;

/// Outcome of [`ColumnResolver::resolve_field_key`]
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Newly resolved and added to the column map
    Added(Arc<ColumnInfo>),
    /// The column map already had this key
    AlreadyPresent(Arc<ColumnInfo>),
    Unresolved,
}

pub struct ColumnResolver<'a> {
    catalog: &'a SchemaCatalog,
    table: &'a TableInfo,
    aliases: AliasManager,
    max_lookup_depth: usize,
}

impl<'a> ColumnResolver<'a> {
    pub fn new(
        catalog: &'a SchemaCatalog,
        table: &'a TableInfo,
        dialect: Arc<dyn SqlDialect>,
        max_lookup_depth: usize,
    ) -> Self {
        ColumnResolver {
            catalog,
            table,
            aliases: AliasManager::for_columns(dialect, table.columns()),
            max_lookup_depth,
        }
    }

    pub fn table(&self) -> &TableInfo {
        self.table
    }

    pub fn aliases(&mut self) -> &mut AliasManager {
        &mut self.aliases
    }

    /// Resolve `key`, consulting and filling `column_map`
    pub fn resolve(&mut self, key: &FieldKey, column_map: &mut ColumnMap) -> Option<Arc<ColumnInfo>> {
        if let Some(column) = column_map.get(key) {
            return Some(Arc::clone(column));
        }
        if key.depth() > self.max_lookup_depth {
            log::debug!(
                "Field key {} exceeds the maximum lookup depth of {}",
                key,
                self.max_lookup_depth
            );
            return None;
        }

        let column = match key.parent() {
            None => self.resolve_root(key)?,
            Some(parent) => self.resolve_lookup(key, &parent, column_map)?,
        };
        column_map.insert(key.clone(), Arc::clone(&column));
        Some(column)
    }

    /// Like [`resolve`](Self::resolve), but distinguishes keys the map already held
    pub fn resolve_field_key(&mut self, key: &FieldKey, column_map: &mut ColumnMap) -> Resolution {
        if let Some(column) = column_map.get(key) {
            return Resolution::AlreadyPresent(Arc::clone(column));
        }
        match self.resolve(key, column_map) {
            Some(column) => Resolution::Added(column),
            None => Resolution::Unresolved,
        }
    }

    fn resolve_root(&mut self, key: &FieldKey) -> Option<Arc<ColumnInfo>> {
        let column = self.table.column(key.name())?;
        let needs_url = column.details_url.is_none() && self.table.is_title_column(&column);
        let needs_alias = column.alias.is_none() && !is_legal_name(&column.name);
        if !needs_url && !needs_alias {
            return Some(column);
        }

        let mut column = (*column).clone();
        if needs_url {
            column.details_url = self.table.details_url();
        }
        if needs_alias {
            let alias = self.aliases.decide_alias(&column.name);
            column = column.aliased(column.field_key.clone(), alias);
        }
        Some(Arc::new(column))
    }

    fn resolve_lookup(
        &mut self,
        key: &FieldKey,
        parent: &FieldKey,
        column_map: &mut ColumnMap,
    ) -> Option<Arc<ColumnInfo>> {
        let parent_column = self.resolve(parent, column_map)?;
        let Some(fk) = parent_column.fk.as_ref() else {
            log::debug!("Cannot resolve {}: {} is not a lookup", key, parent);
            return None;
        };
        let Some(lookup) = fk.create_lookup_column(&parent_column, key.name(), self.catalog) else {
            log::debug!(
                "Cannot resolve {}: no column '{}' in {}.{}",
                key,
                key.name(),
                fk.lookup_schema,
                fk.lookup_table
            );
            return None;
        };
        let alias = self.aliases.decide_alias_for_key(&lookup.field_key);
        Some(Arc::new(lookup.aliased(key.clone(), alias)))
    }

    /// Resolve `keys` in order, silently omitting those that cannot be resolved.
    ///
    /// `existing` columns seed the memo. A root key that matches a column alias
    /// (but no column name) resolves to that column.
    pub fn get_columns(
        &mut self,
        keys: &[FieldKey],
        existing: &[Arc<ColumnInfo>],
    ) -> Vec<(FieldKey, Arc<ColumnInfo>)> {
        let mut column_map: ColumnMap = existing
            .iter()
            .map(|c| (c.field_key.clone(), Arc::clone(c)))
            .collect();
        let mut result: Vec<(FieldKey, Arc<ColumnInfo>)> = Vec::new();

        for key in keys {
            if result.iter().any(|(k, _)| k == key) {
                continue;
            }
            let column = self.resolve(key, &mut column_map).or_else(|| {
                if key.parent().is_some() {
                    return None;
                }
                self.table.column_by_alias(key.name())
            });
            match column {
                Some(column) => result.push((key.clone(), column)),
                None => log::debug!("get_columns: omitting unresolved key {}", key),
            }
        }
        result
    }
}
