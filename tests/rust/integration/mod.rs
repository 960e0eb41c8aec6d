//! Integration tests - schema loading, resolution and generation working together
//!
//! The SQLite tests execute generated SQL against an in-memory database.

mod generation_tests;
mod sqlite_execution_tests;
mod test_schemas;
