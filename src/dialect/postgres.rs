use std::collections::HashSet;

use super::{append_clauses, DialectError, DialectKind, MaxRows, PagedQuery, SqlDialect};
use crate::query::fragment::SqlFragment;

lazy_static::lazy_static! {
    static ref RESERVED_WORDS: HashSet<&'static str> = [
        "ALL", "ANALYSE", "ANALYZE", "AND", "ANY", "ARRAY", "AS", "ASC", "ASYMMETRIC",
        "BOTH", "CASE", "CAST", "CHECK", "COLLATE", "COLUMN", "CONSTRAINT", "CREATE",
        "CURRENT_CATALOG", "CURRENT_DATE", "CURRENT_ROLE", "CURRENT_TIME",
        "CURRENT_TIMESTAMP", "CURRENT_USER", "DEFAULT", "DEFERRABLE", "DESC", "DISTINCT",
        "DO", "ELSE", "END", "EXCEPT", "FALSE", "FETCH", "FOR", "FOREIGN", "FROM", "GRANT",
        "GROUP", "HAVING", "IN", "INITIALLY", "INTERSECT", "INTO", "LATERAL", "LEADING",
        "LIMIT", "LOCALTIME", "LOCALTIMESTAMP", "NOT", "NULL", "OFFSET", "ON", "ONLY", "OR",
        "ORDER", "PLACING", "PRIMARY", "REFERENCES", "RETURNING", "SELECT", "SESSION_USER",
        "SOME", "SYMMETRIC", "TABLE", "THEN", "TO", "TRAILING", "TRUE", "UNION", "UNIQUE",
        "USER", "USING", "VARIADIC", "WHEN", "WHERE", "WINDOW", "WITH",
    ]
    .into_iter()
    .collect();
}

/// PostgreSQL: `LIMIT n [OFFSET m]`
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn is_reserved(&self, word: &str) -> bool {
        RESERVED_WORDS.contains(word.to_ascii_uppercase().as_str())
    }

    fn max_identifier_length(&self) -> usize {
        63
    }

    fn concatenation_operator(&self) -> &'static str {
        "||"
    }

    fn supports_offset(&self) -> bool {
        true
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn limit_rows(&self, query: PagedQuery) -> Result<SqlFragment, DialectError> {
        let mut sql = query.select;
        sql.append("\n");
        sql.append_fragment(&query.from);
        append_clauses(
            &mut sql,
            query.filter.as_ref(),
            query.group_by.as_deref(),
            query.order_by.as_deref(),
        );

        match query.max_rows {
            MaxRows::NoRows => {
                sql.append("\nLIMIT 0");
            }
            MaxRows::Limit(n) => {
                sql.append(&format!("\nLIMIT {}", n));
                if query.offset > 0 {
                    sql.append(&format!(" OFFSET {}", query.offset));
                }
            }
            MaxRows::All => {
                if query.offset > 0 {
                    sql.append(&format!("\nOFFSET {}", query.offset));
                }
            }
        }
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paged(max_rows: MaxRows, offset: u64) -> PagedQuery {
        PagedQuery {
            select: SqlFragment::from_sql("SELECT *"),
            from: SqlFragment::from_sql("FROM t"),
            filter: Some(SqlFragment::from_sql("WHERE a = 1")),
            order_by: Some("ORDER BY a ASC".to_string()),
            group_by: None,
            max_rows,
            offset,
        }
    }

    #[test]
    fn test_limit_only() {
        let sql = PostgresDialect.limit_rows(paged(MaxRows::Limit(10), 0)).unwrap();
        assert_eq!(
            sql.sql(),
            "SELECT *\nFROM t\nWHERE a = 1\nORDER BY a ASC\nLIMIT 10"
        );
    }

    #[test]
    fn test_limit_and_offset() {
        let sql = PostgresDialect.limit_rows(paged(MaxRows::Limit(10), 20)).unwrap();
        assert!(sql.sql().ends_with("\nLIMIT 10 OFFSET 20"));
    }

    #[test]
    fn test_no_rows_is_limit_zero() {
        let sql = PostgresDialect.limit_rows(paged(MaxRows::NoRows, 0)).unwrap();
        assert!(sql.sql().ends_with("\nLIMIT 0"));
    }

    #[test]
    fn test_offset_without_limit() {
        let sql = PostgresDialect.limit_rows(paged(MaxRows::All, 5)).unwrap();
        assert!(sql.sql().ends_with("ORDER BY a ASC\nOFFSET 5"));
        assert!(!sql.sql().contains("LIMIT"));
    }

    #[test]
    fn test_reserved_words_case_insensitive() {
        assert!(PostgresDialect.is_reserved("order"));
        assert!(PostgresDialect.is_reserved("User"));
        assert!(!PostgresDialect.is_reserved("DisplayName"));
    }
}
