//! Filter expression parsing edge cases and binding through the public API
//!
//! Malformed input must produce errors, never panics.

#[cfg(test)]
mod expression_tests {
    use std::sync::Arc;

    use viewsql::dialect::{PostgresDialect, SqlServerDialect};
    use viewsql::expression::{bind, parse_expression, BindContext, BindError};
    use viewsql::query::{ColumnMap, Filter, FilterBinding};
    use viewsql::schema::{ColumnInfo, FieldKey, JdbcType};

    #[test]
    fn test_malformed_expressions_no_panic() {
        let mut malformed: Vec<String> = [
            "",
            "   ",
            "(",
            ")",
            "Age >",
            "Age > > 3",
            "'open",
            "\"open",
            "Age IN (1, 2",
            "Age BETWEEN 1",
            "lower(",
            "NOT",
            "Age = 1 AND",
            "$",
            "Groups.",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        // Nesting far past the parser's depth budget
        malformed.push(format!("{}UserId = 1{}", "(".repeat(2000), ")".repeat(2000)));
        malformed.push(format!("{}UserId = 1", "NOT ".repeat(2000)));
        malformed.push(format!("UserId = {}1", "- ".repeat(2000)));

        for text in &malformed {
            let text = text.as_str();
            let result = parse_expression(text);
            assert!(result.is_err(), "expected an error for {:?}", text);
            let errors = result.unwrap_err();
            assert!(!errors.is_empty());
            for error in errors.iter() {
                if let Some(position) = error.position {
                    assert!(position <= text.len(), "position out of range for {:?}", text);
                }
            }
        }
    }

    #[test]
    fn test_free_identifiers() {
        let expr =
            parse_expression("lower(Groups.Owner.Name) LIKE 'a%' OR Age > $min OR Age IS NULL")
                .unwrap();
        assert_eq!(
            expr.collect_field_keys(),
            vec![FieldKey::from_string("Groups/Owner/Name"), FieldKey::from_name("Age")]
        );
    }

    #[test]
    fn test_deeply_nested_filter_degrades() {
        let map = columns();
        let mut filter = Filter::new();
        filter.add_where_clause(format!("{}Name = 'a'{}", "(".repeat(2000), ")".repeat(2000)));
        assert!(filter.where_param_field_keys().is_empty());

        let mut warnings = Vec::new();
        let fragment = filter
            .sql_fragment(
                &FilterBinding {
                    dialect: &PostgresDialect,
                    columns: &map,
                    table_alias: None,
                    strict: false,
                },
                &mut warnings,
            )
            .unwrap()
            .unwrap();
        assert_eq!(fragment.sql(), "WHERE 0=1");
        assert_eq!(warnings.len(), 1);
    }

    fn columns() -> ColumnMap {
        let mut map = ColumnMap::new();
        for column in [
            ColumnInfo::new("Name", JdbcType::Varchar),
            ColumnInfo::new("Created", JdbcType::Timestamp),
        ] {
            map.insert(column.field_key.clone(), Arc::new(column));
        }
        map
    }

    #[test]
    fn test_methods_follow_dialect() {
        let map = columns();
        let expr = parse_expression("year(Created) = 2024 AND trim(Name) <> ''").unwrap();

        let pg = bind(
            &expr,
            &BindContext {
                dialect: &PostgresDialect,
                columns: &map,
                table_alias: None,
            },
        )
        .unwrap();
        assert_eq!(
            pg.sql(),
            "((EXTRACT(YEAR FROM Created) = 2024) AND (TRIM(Name) <> ''))"
        );

        let mssql = bind(
            &expr,
            &BindContext {
                dialect: &SqlServerDialect,
                columns: &map,
                table_alias: Some("x"),
            },
        )
        .unwrap();
        assert_eq!(
            mssql.sql(),
            "((YEAR(x.Created) = 2024) AND (LTRIM(RTRIM(x.Name)) <> ''))"
        );
    }

    #[test]
    fn test_wrong_argument_count() {
        let map = columns();
        let expr = parse_expression("lower(Name, Name) = 'a'").unwrap();
        let err = bind(
            &expr,
            &BindContext {
                dialect: &PostgresDialect,
                columns: &map,
                table_alias: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, BindError::WrongArgumentCount { found: 2, .. }));
    }
}
