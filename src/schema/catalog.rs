/// Schema catalog: the process-wide cache of table metadata
///
/// Tables are registered once and shared as `Arc<TableInfo>`. Nothing is
/// evicted implicitly; a schema change calls one of the `invalidate_*`
/// methods, which bumps the catalog generation and notifies listeners so
/// dependent caches can drop their entries.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::table_info::TableInfo;

/// What was invalidated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    Table { schema: String, table: String },
    Schema { schema: String },
    All,
}

type Listener = Box<dyn Fn(&Invalidation) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TableKey {
    schema: String,
    table: String,
}

impl TableKey {
    fn new(schema: &str, table: &str) -> Self {
        TableKey {
            schema: schema.to_ascii_lowercase(),
            table: table.to_ascii_lowercase(),
        }
    }
}

#[derive(Default)]
pub struct SchemaCatalog {
    tables: RwLock<HashMap<TableKey, Arc<TableInfo>>>,
    listeners: RwLock<Vec<Listener>>,
    generation: AtomicU64,
}

impl std::fmt::Debug for SchemaCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCatalog")
            .field("tables", &self.len())
            .field("generation", &self.generation())
            .finish()
    }
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a table. Replacing counts as an invalidation of the old entry.
    pub fn register(&self, table: TableInfo) -> Arc<TableInfo> {
        let key = TableKey::new(&table.schema, &table.name);
        let event = Invalidation::Table {
            schema: table.schema.clone(),
            table: table.name.clone(),
        };
        let table = Arc::new(table);
        let replaced = self
            .tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&table))
            .is_some();
        if replaced {
            log::debug!("Replaced table metadata for {}.{}", table.schema, table.name);
            self.notify(&event);
        }
        table
    }

    /// Case-insensitive lookup by schema and table name
    pub fn table(&self, schema: &str, table: &str) -> Option<Arc<TableInfo>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TableKey::new(schema, table))
            .cloned()
    }

    pub fn table_names(&self) -> Vec<(String, String)> {
        let mut names: Vec<(String, String)> = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|t| (t.schema.clone(), t.name.clone()))
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Incremented on every invalidation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn on_invalidate<F>(&self, listener: F)
    where
        F: Fn(&Invalidation) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    /// Drop one table. Returns true if it was present.
    pub fn invalidate_table(&self, schema: &str, table: &str) -> bool {
        let removed = self
            .tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&TableKey::new(schema, table))
            .is_some();
        if removed {
            self.notify(&Invalidation::Table {
                schema: schema.to_string(),
                table: table.to_string(),
            });
        }
        removed
    }

    /// Drop every table of a schema. Returns the number removed.
    pub fn invalidate_schema(&self, schema: &str) -> usize {
        let schema_key = schema.to_ascii_lowercase();
        let removed = {
            let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
            let before = tables.len();
            tables.retain(|key, _| key.schema != schema_key);
            before - tables.len()
        };
        if removed > 0 {
            self.notify(&Invalidation::Schema {
                schema: schema.to_string(),
            });
        }
        removed
    }

    pub fn clear(&self) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.notify(&Invalidation::All);
    }

    fn notify(&self, event: &Invalidation) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("Schema catalog invalidation {:?} (generation {})", event, generation);
        for listener in self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            listener(event);
        }
    }
}
