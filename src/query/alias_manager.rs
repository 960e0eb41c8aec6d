/// Alias assignment for generated columns and joins
///
/// Aliases must be legal, unquoted identifiers in the target dialect and
/// unique (ignoring case) within one SELECT. Names longer than the dialect's
/// identifier limit keep a prefix and gain an 8-digit SHA-256 digest of the
/// full name, so distinct long names stay distinct after truncation.
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::dialect::SqlDialect;
use crate::schema::{ColumnInfo, FieldKey};

pub use crate::dialect::is_legal_name;

const DIGEST_LEN: usize = 8;

/// Map `name` onto a legal identifier: illegal characters become `_`, a
/// leading digit or reserved word gains a `_` prefix, overlong names are
/// truncated with a digest suffix.
pub fn make_legal_name(name: &str, dialect: &dyn SqlDialect) -> String {
    let mut legal: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if legal.is_empty() || legal.starts_with(|c: char| c.is_ascii_digit()) {
        legal.insert(0, '_');
    }
    if dialect.is_reserved(&legal) {
        legal.insert(0, '_');
    }
    truncate_with_digest(legal, name, dialect.max_identifier_length())
}

fn truncate_with_digest(legal: String, original: &str, max_len: usize) -> String {
    if legal.len() <= max_len {
        return legal;
    }
    let digest = hex::encode(Sha256::digest(original.as_bytes()));
    let keep = max_len.saturating_sub(DIGEST_LEN + 1);
    // `legal` is ASCII
    format!("{}_{}", &legal[..keep], &digest[..DIGEST_LEN])
}

/// Issues unique aliases for one SQL generation call
pub struct AliasManager {
    dialect: Arc<dyn SqlDialect>,
    decided: HashMap<String, String>,
    taken: HashSet<String>,
}

impl AliasManager {
    pub fn new(dialect: Arc<dyn SqlDialect>) -> Self {
        AliasManager {
            dialect,
            decided: HashMap::new(),
            taken: HashSet::new(),
        }
    }

    /// Manager with the aliases of `columns` already reserved
    pub fn for_columns(dialect: Arc<dyn SqlDialect>, columns: &[Arc<ColumnInfo>]) -> Self {
        let mut manager = AliasManager::new(dialect);
        for column in columns {
            manager.reserve(column.alias());
        }
        manager
    }

    pub fn reserve(&mut self, alias: &str) {
        self.taken.insert(alias.to_ascii_lowercase());
    }

    pub fn is_taken(&self, alias: &str) -> bool {
        self.taken.contains(&alias.to_ascii_lowercase())
    }

    /// Alias for `name`; the same name (ignoring case) always gets the same alias
    pub fn decide_alias(&mut self, name: &str) -> String {
        let memo_key = name.to_ascii_lowercase();
        if let Some(alias) = self.decided.get(&memo_key) {
            return alias.clone();
        }

        let base = make_legal_name(name, self.dialect.as_ref());
        let max_len = self.dialect.max_identifier_length();
        let mut candidate = base.clone();
        let mut n = 1;
        while self.is_taken(&candidate) {
            let suffix = format!("_{}", n);
            let keep = base.len().min(max_len.saturating_sub(suffix.len()));
            candidate = format!("{}{}", &base[..keep], suffix);
            n += 1;
        }

        self.reserve(&candidate);
        self.decided.insert(memo_key, candidate.clone());
        candidate
    }

    /// Alias derived from the canonical form of `key`
    pub fn decide_alias_for_key(&mut self, key: &FieldKey) -> String {
        self.decide_alias(&key.to_string())
    }
}
