use std::sync::Arc;

use crate::schema::SchemaCatalog;

/// Per-call context for resolution and generation.
///
/// Passed explicitly to every call; the engine never reads ambient state.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub catalog: Arc<SchemaCatalog>,
    /// Identity recorded by audit logging
    pub user: Option<String>,
    pub container: Option<String>,
}

impl QueryContext {
    pub fn new(catalog: Arc<SchemaCatalog>) -> Self {
        QueryContext {
            catalog,
            user: None,
            container: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }
}
