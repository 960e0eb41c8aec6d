//! Required-column closure
//!
//! Extends a selection with every column the generated SQL depends on: the
//! required Container column, filter and sort references, sort substitutes,
//! and lookup-suggested columns. Filter comparisons and sort entries whose
//! keys cannot be resolved are pruned.

use std::collections::HashSet;
use std::sync::Arc;

use super::column_resolver::{ColumnMap, ColumnResolver, Resolution};
use super::filter::Filter;
use super::sort::Sort;
use crate::schema::{ColumnInfo, FieldKey};

#[derive(Debug, Clone, Default)]
pub struct RequiredColumns {
    /// Selected plus required columns, unique by field key, in insertion order
    pub columns: Vec<Arc<ColumnInfo>>,
    /// `columns` plus sort substitutes
    pub involved: Vec<Arc<ColumnInfo>>,
    pub unresolved: Vec<FieldKey>,
}

#[derive(Default)]
struct Collector {
    columns: Vec<Arc<ColumnInfo>>,
    keys: HashSet<FieldKey>,
    extra_involved: Vec<Arc<ColumnInfo>>,
    unresolved: Vec<FieldKey>,
}

impl Collector {
    fn add(&mut self, column: Arc<ColumnInfo>) {
        if self.keys.insert(column.field_key.clone()) {
            self.columns.push(column);
        }
    }

    fn contains(&self, key: &FieldKey) -> bool {
        self.keys.contains(key)
    }

    fn involve(&mut self, column: Arc<ColumnInfo>) {
        if !self.extra_involved.iter().any(|c| c.field_key == column.field_key) {
            self.extra_involved.push(column);
        }
    }

    fn unresolved(&mut self, key: &FieldKey) {
        if !self.unresolved.contains(key) {
            self.unresolved.push(key.clone());
        }
    }

    fn finish(self) -> RequiredColumns {
        let mut involved = self.columns.clone();
        for column in self.extra_involved {
            if !self.keys.contains(&column.field_key) {
                involved.push(column);
            }
        }
        RequiredColumns {
            columns: self.columns,
            involved,
            unresolved: self.unresolved,
        }
    }
}

/// Compute the columns a query over `base` needs.
///
/// `column_map` is filled with every resolved key. Re-applying the result
/// (its columns as `base`, with the pruned filter and sort) adds nothing.
pub fn ensure_required_columns(
    resolver: &mut ColumnResolver<'_>,
    base: &[Arc<ColumnInfo>],
    mut filter: Option<&mut Filter>,
    mut sort: Option<&mut Sort>,
    column_map: &mut ColumnMap,
) -> RequiredColumns {
    let mut collected = Collector::default();

    for column in base {
        column_map.insert(column.field_key.clone(), Arc::clone(column));
        collected.add(Arc::clone(column));
    }

    if let Some(container) = resolver.table().container_column() {
        if container.required && !column_map.contains_key(&container.field_key) {
            column_map.insert(container.field_key.clone(), Arc::clone(&container));
            collected.add(container);
        }
    }

    if let Some(filter) = filter.as_deref() {
        for key in filter.where_param_field_keys() {
            match resolver.resolve_field_key(&key, column_map) {
                Resolution::Added(column) | Resolution::AlreadyPresent(column) => {
                    collected.add(column)
                }
                Resolution::Unresolved => collected.unresolved(&key),
            }
        }
    }

    if let Some(sort) = sort.as_deref() {
        for field in sort.sort_list() {
            match resolver.resolve_field_key(&field.field_key, column_map) {
                // Already selected: only its sort keys are needed
                Resolution::AlreadyPresent(column) if collected.contains(&column.field_key) => {
                    add_sort_columns(resolver, &column, column_map, &mut collected, true);
                }
                // New, or only resolved earlier as the parent of a lookup
                Resolution::Added(column) | Resolution::AlreadyPresent(column) => {
                    collected.add(Arc::clone(&column));
                    add_sort_columns(resolver, &column, column_map, &mut collected, false);
                }
                Resolution::Unresolved => collected.unresolved(&field.field_key),
            }
        }
    }

    if !collected.unresolved.is_empty() {
        log::debug!(
            "Unable to resolve columns on table {}: {:?}",
            resolver.table().name,
            collected.unresolved
        );
        for key in &collected.unresolved {
            if let Some(filter) = filter.as_deref_mut() {
                filter.delete_conditions(key);
            }
            if let Some(sort) = sort.as_deref_mut() {
                sort.delete_sort_column(key);
            }
        }
    }

    add_suggested_columns(resolver, column_map, &mut collected);

    collected.finish()
}

/// Sort substitutes and missing-value companion of `column`, falling back to
/// the column itself when any of them cannot be resolved
fn add_sort_columns(
    resolver: &mut ColumnResolver<'_>,
    column: &Arc<ColumnInfo>,
    column_map: &mut ColumnMap,
    collected: &mut Collector,
    keys_only: bool,
) {
    let sort_keys: Vec<FieldKey> = column
        .sort_field_keys
        .iter()
        .chain(column.mv_column.iter())
        .cloned()
        .collect();

    if sort_keys.is_empty() {
        if !keys_only {
            collected.add(Arc::clone(column));
        }
        return;
    }

    let mut substitutes = Vec::with_capacity(sort_keys.len());
    for key in &sort_keys {
        match resolver.resolve(key, column_map) {
            Some(substitute) => substitutes.push(substitute),
            None => {
                log::debug!(
                    "Sort key {} of {} is unresolvable; sorting on the raw value",
                    key,
                    column.field_key
                );
                substitutes.clear();
                if !keys_only {
                    collected.add(Arc::clone(column));
                }
                break;
            }
        }
    }

    for substitute in substitutes {
        collected.add(Arc::clone(&substitute));
        collected.involve(substitute);
    }
}

/// Suggested columns of every lookup on the path of every collected column.
///
/// Runs until no new column appears, so columns added by suggestion have
/// their own lookups considered as well.
fn add_suggested_columns(
    resolver: &mut ColumnResolver<'_>,
    column_map: &mut ColumnMap,
    collected: &mut Collector,
) {
    let mut visited: HashSet<FieldKey> = HashSet::new();
    let mut next = 0;

    while next < collected.columns.len() {
        let column = Arc::clone(&collected.columns[next]);
        next += 1;

        let mut current = Some(column.field_key.clone());
        while let Some(key) = current {
            current = key.parent();
            if !visited.insert(key.clone()) {
                continue;
            }
            let Some(owner) = resolver.resolve(&key, column_map) else {
                continue;
            };
            let Some(fk) = owner.fk.as_ref() else {
                continue;
            };
            for suggested in fk.suggested_columns() {
                // relative to the table that declares the lookup column
                let target = match key.parent() {
                    Some(parent) => suggested.rebase(&parent),
                    None => suggested.clone(),
                };
                match resolver.resolve(&target, column_map) {
                    Some(resolved) => collected.add(resolved),
                    None => log::debug!(
                        "Suggested column {} of lookup {} is unresolvable",
                        target,
                        key
                    ),
                }
            }
        }
    }
}
