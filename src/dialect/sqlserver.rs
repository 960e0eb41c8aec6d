use std::collections::HashSet;

use super::{append_clauses, DialectError, DialectKind, MaxRows, PagedQuery, SqlDialect};
use crate::query::fragment::SqlFragment;

lazy_static::lazy_static! {
    static ref RESERVED_WORDS: HashSet<&'static str> = [
        "ADD", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "AUTHORIZATION", "BACKUP", "BEGIN",
        "BETWEEN", "BREAK", "BROWSE", "BULK", "BY", "CASCADE", "CASE", "CHECK", "CHECKPOINT",
        "CLOSE", "CLUSTERED", "COALESCE", "COLLATE", "COLUMN", "COMMIT", "COMPUTE",
        "CONSTRAINT", "CONTAINS", "CONTINUE", "CONVERT", "CREATE", "CROSS", "CURRENT",
        "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "CURRENT_USER", "CURSOR",
        "DATABASE", "DEALLOCATE", "DECLARE", "DEFAULT", "DELETE", "DENY", "DESC", "DISTINCT",
        "DOUBLE", "DROP", "ELSE", "END", "ESCAPE", "EXCEPT", "EXEC", "EXECUTE", "EXISTS",
        "EXIT", "FETCH", "FILE", "FOR", "FOREIGN", "FROM", "FULL", "FUNCTION", "GOTO",
        "GRANT", "GROUP", "HAVING", "IDENTITY", "IF", "IN", "INDEX", "INNER", "INSERT",
        "INTERSECT", "INTO", "IS", "JOIN", "KEY", "KILL", "LEFT", "LIKE", "MERGE",
        "NOCHECK", "NONCLUSTERED", "NOT", "NULL", "NULLIF", "OF", "OFF", "OFFSETS", "ON",
        "OPEN", "OPTION", "OR", "ORDER", "OUTER", "OVER", "PERCENT", "PIVOT", "PLAN",
        "PRIMARY", "PRINT", "PROC", "PROCEDURE", "PUBLIC", "READ", "REFERENCES", "RETURN",
        "REVOKE", "RIGHT", "ROLLBACK", "ROWCOUNT", "RULE", "SAVE", "SCHEMA", "SELECT",
        "SESSION_USER", "SET", "SOME", "STATISTICS", "SYSTEM_USER", "TABLE", "THEN", "TO",
        "TOP", "TRAN", "TRANSACTION", "TRIGGER", "TRUNCATE", "UNION", "UNIQUE", "UNPIVOT",
        "UPDATE", "USE", "USER", "VALUES", "VARYING", "VIEW", "WHEN", "WHERE", "WHILE",
        "WITH",
    ]
    .into_iter()
    .collect();
}

fn is_reserved_word(word: &str) -> bool {
    RESERVED_WORDS.contains(word.to_ascii_uppercase().as_str())
}

/// SQL Server 2008 and later: `TOP n`, or `ROW_NUMBER()` paging when an offset is requested
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

/// SQL Server 2000: `TOP n` only
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServer2000Dialect;

impl SqlDialect for SqlServerDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::SqlServer
    }

    fn is_reserved(&self, word: &str) -> bool {
        is_reserved_word(word)
    }

    fn max_identifier_length(&self) -> usize {
        128
    }

    fn concatenation_operator(&self) -> &'static str {
        "+"
    }

    fn supports_offset(&self) -> bool {
        true
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn limit_rows(&self, query: PagedQuery) -> Result<SqlFragment, DialectError> {
        if query.offset == 0 || matches!(query.max_rows, MaxRows::NoRows) {
            return top_rows(query);
        }
        if query.order_by.as_deref().map_or(true, |o| o.trim().is_empty()) {
            return Err(DialectError::OrderByRequired {
                dialect: self.kind().to_string(),
            });
        }
        row_number_rows(query)
    }
}

impl SqlDialect for SqlServer2000Dialect {
    fn kind(&self) -> DialectKind {
        DialectKind::SqlServer2000
    }

    fn is_reserved(&self, word: &str) -> bool {
        is_reserved_word(word)
    }

    fn max_identifier_length(&self) -> usize {
        128
    }

    fn concatenation_operator(&self) -> &'static str {
        "+"
    }

    fn supports_offset(&self) -> bool {
        false
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn limit_rows(&self, query: PagedQuery) -> Result<SqlFragment, DialectError> {
        if query.offset > 0 && !matches!(query.max_rows, MaxRows::NoRows) {
            return Err(DialectError::UnsupportedPagination {
                dialect: self.kind().to_string(),
            });
        }
        top_rows(query)
    }
}

/// Byte offset just past `SELECT` or `SELECT DISTINCT`, where `TOP n` belongs
fn top_insertion_point(select: &str) -> Result<usize, DialectError> {
    let trimmed_start = select.len() - select.trim_start().len();
    let upper = select[trimmed_start..].to_ascii_uppercase();
    if !upper.starts_with("SELECT") {
        return Err(DialectError::MalformedSelect(select.to_string()));
    }
    let mut at = trimmed_start + "SELECT".len();
    let rest = &upper["SELECT".len()..];
    let after_ws = rest.trim_start();
    if after_ws.starts_with("DISTINCT")
        && after_ws["DISTINCT".len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_alphanumeric() && c != '_')
    {
        at += (rest.len() - after_ws.len()) + "DISTINCT".len();
    }
    Ok(at)
}

fn top_rows(query: PagedQuery) -> Result<SqlFragment, DialectError> {
    let mut sql = query.select;
    let top = match query.max_rows {
        MaxRows::All => None,
        MaxRows::NoRows => Some(0),
        MaxRows::Limit(n) => Some(n),
    };
    if let Some(n) = top {
        let at = top_insertion_point(sql.sql())?;
        sql.insert_sql(at, &format!(" TOP {}", n));
    }
    sql.append("\n");
    sql.append_fragment(&query.from);
    append_clauses(
        &mut sql,
        query.filter.as_ref(),
        query.group_by.as_deref(),
        query.order_by.as_deref(),
    );
    Ok(sql)
}

fn row_number_rows(query: PagedQuery) -> Result<SqlFragment, DialectError> {
    top_insertion_point(query.select.sql())?;
    let order_by = query.order_by.unwrap_or_default();

    let mut sql = SqlFragment::from_sql("SELECT * FROM (\n");
    sql.append_fragment(&query.select);
    sql.append(",\nROW_NUMBER() OVER (\n");
    sql.append(&order_by);
    sql.append(") AS _RowNum\n");
    sql.append_fragment(&query.from);
    append_clauses(&mut sql, query.filter.as_ref(), query.group_by.as_deref(), None);
    sql.append("\n) AS z\n");

    let first = query.offset + 1;
    match query.max_rows {
        MaxRows::Limit(n) => {
            sql.append(&format!(
                "WHERE _RowNum BETWEEN {} AND {}",
                first,
                query.offset + n
            ));
        }
        _ => {
            sql.append(&format!("WHERE _RowNum >= {}", first));
        }
    }
    sql.append("\nORDER BY _RowNum");
    Ok(sql)
}
