//! URL filter clauses rendered against resolved columns

#[cfg(test)]
mod filter_tests {
    use std::sync::Arc;

    use serde_json::json;
    use test_case::test_case;
    use viewsql::dialect::{DialectKind, SqlDialect};
    use viewsql::query::{ColumnMap, CompareType, Filter, FilterBinding, SqlParam};
    use viewsql::schema::{ColumnInfo, JdbcType};

    fn columns() -> ColumnMap {
        let mut map = ColumnMap::new();
        for column in [
            ColumnInfo::new("Name", JdbcType::Varchar),
            ColumnInfo::new("Age", JdbcType::Integer),
            ColumnInfo::new("Active", JdbcType::Boolean),
            ColumnInfo::new("Created", JdbcType::Timestamp).with_alias("order"),
        ] {
            map.insert(column.field_key.clone(), Arc::new(column));
        }
        map
    }

    fn render(kind: DialectKind, clauses: &[&str]) -> (String, Vec<SqlParam>) {
        let dialect: Arc<dyn SqlDialect> = kind.dialect();
        let map = columns();
        let mut filter = Filter::new();
        for clause in clauses {
            filter.parse_url_clause(clause).expect("clause parses");
        }
        let mut warnings = Vec::new();
        let fragment = filter
            .sql_fragment(
                &FilterBinding {
                    dialect: dialect.as_ref(),
                    columns: &map,
                    table_alias: None,
                    strict: false,
                },
                &mut warnings,
            )
            .expect("renders")
            .expect("non-empty filter");
        assert!(warnings.is_empty(), "{:?}", warnings);
        (fragment.sql().to_string(), fragment.params().to_vec())
    }

    #[test_case(DialectKind::Postgres, "Age~gt=3", "WHERE Age > ?" ; "typed comparison")]
    #[test_case(DialectKind::Postgres, "Name~eq=", "WHERE Name IS NULL" ; "empty equals is null")]
    #[test_case(DialectKind::Postgres, "Name~neq=", "WHERE Name IS NOT NULL" ; "empty not equals")]
    #[test_case(DialectKind::Postgres, "Name~isnonblank", "WHERE Name IS NOT NULL" ; "unary operator")]
    #[test_case(DialectKind::Postgres, "Name~in=a;b", "WHERE (Name IN (?, ?))" ; "in list")]
    #[test_case(DialectKind::Postgres, "Name~in=a;", "WHERE (Name IN (?) OR Name IS NULL)" ; "in list with null")]
    #[test_case(DialectKind::Postgres, "Name~notin=a", "WHERE (Name NOT IN (?) OR Name IS NULL)" ; "not in keeps nulls")]
    #[test_case(DialectKind::Postgres, "Name~startswith=Jo", "WHERE Name LIKE ? || '%'" ; "starts with postgres")]
    #[test_case(DialectKind::SqlServer, "Name~contains=o", "WHERE Name LIKE '%' + ? + '%'" ; "contains sql server")]
    #[test_case(DialectKind::Postgres, "Created~lt=2024-01-01", "WHERE \"order\" < ?" ; "reserved alias quoted")]
    fn test_url_clause_sql(kind: DialectKind, clause: &str, expected: &str) {
        let (sql, _) = render(kind, &[clause]);
        assert_eq!(sql, expected);
    }

    #[test]
    fn test_values_follow_column_type() {
        let (sql, params) = render(DialectKind::Postgres, &["Age~gte=21", "Active~eq=yes", "Name~eq=42"]);
        assert_eq!(sql, "WHERE Age >= ? AND Active = ? AND Name = ?");
        assert_eq!(
            params,
            vec![
                SqlParam::Value(json!(21)),
                SqlParam::Value(json!(true)),
                SqlParam::Value(json!("42")),
            ]
        );
    }

    #[test]
    fn test_malformed_url_clauses_are_rejected() {
        let mut filter = Filter::new();
        assert!(filter.parse_url_clause("Name=Bob").is_err());
        assert!(filter.parse_url_clause("Name~like=Bob").is_err());
        assert!(filter.parse_url_clause("~eq=Bob").is_err());
        assert!(filter.is_empty());
    }

    #[test]
    fn test_compare_type_keys() {
        assert_eq!(CompareType::from_url_key("DoesNotContain"), Some(CompareType::DoesNotContain));
        assert_eq!(CompareType::NotIn.to_string(), "notin");
        assert!(CompareType::In.is_multi_valued());
        assert!(CompareType::IsBlank.is_unary());
    }
}
