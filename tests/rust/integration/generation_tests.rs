//! End-to-end generation over a YAML-loaded schema: lookups, required
//! columns, audit logging, filters and dialect pagination.

#[cfg(test)]
mod generation_tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use serde_json::json;
    use viewsql::config::GeneratorConfig;
    use viewsql::dialect::{DialectError, DialectKind, MaxRows};
    use viewsql::query::{
        bind_named_parameters, validate_named_parameters, Filter, QueryContext, QueryError,
        SelectRequest, SelectSql, Sort, SqlGenerator, SqlParam,
    };
    use viewsql::schema::{ColumnInfo, FieldKey, TableInfo};

    use crate::test_schemas::context;

    fn generator(kind: DialectKind) -> SqlGenerator {
        SqlGenerator::new(GeneratorConfig {
            dialect: kind,
            ..GeneratorConfig::default()
        })
    }

    fn users(ctx: &QueryContext) -> Arc<TableInfo> {
        ctx.catalog.table("core", "Users").expect("Users table")
    }

    fn select(gen: &SqlGenerator, ctx: &QueryContext, keys: &[&str]) -> Vec<Arc<ColumnInfo>> {
        let keys: Vec<FieldKey> = keys.iter().map(|k| FieldKey::from_string(k)).collect();
        gen.get_columns(ctx, &users(ctx), &keys, &[])
            .into_iter()
            .map(|(_, column)| column)
            .collect()
    }

    fn generate(gen: &SqlGenerator, ctx: &QueryContext, request: SelectRequest) -> SelectSql {
        gen.get_select_sql(ctx, request).expect("generation succeeds")
    }

    #[test]
    fn test_lookup_chain_through_cycle() {
        let ctx = context();
        let gen = generator(DialectKind::Postgres);
        let columns = select(
            &gen,
            &ctx,
            &["DisplayName", "Groups/Owner/DisplayName", "Groups/Missing"],
        );
        assert_eq!(columns.len(), 2, "unresolvable keys are omitted");

        let request = SelectRequest::new(users(&ctx))
            .with_columns(columns)
            .with_max_rows(MaxRows::Limit(5));
        let result = generate(&gen, &ctx, request);
        let sql = result.fragment.sql();

        assert!(sql.starts_with("SELECT DisplayName, Groups_Owner_DisplayName\nFROM (\n"), "{}", sql);
        assert!(sql.contains(
            "LEFT OUTER JOIN core.Groups Users_Groups ON Users.Groups = Users_Groups.GroupId"
        ));
        assert!(sql.contains("LEFT OUTER JOIN core.Users "));
        assert_eq!(sql.matches("LEFT OUTER JOIN").count(), 2);
        // suggested by the Groups lookup
        assert!(sql.contains("Users_Groups.Code AS Groups_Code"));
        assert!(sql.ends_with(
            "ORDER BY DisplayName ASC, Groups_Owner_DisplayName ASC\nLIMIT 5"
        ));
    }

    #[test]
    fn test_sort_on_lookup_uses_substitute() {
        let ctx = context();
        let gen = generator(DialectKind::Postgres);
        let request = SelectRequest::new(users(&ctx))
            .with_columns(select(&gen, &ctx, &["DisplayName"]))
            .with_sort(Sort::parse_url("Groups/Name"))
            .with_max_rows(MaxRows::Limit(10));
        let result = generate(&gen, &ctx, request);
        let sql = result.fragment.sql();

        assert!(sql.contains("Users_Groups.Rank AS Groups_Rank"), "{}", sql);
        assert!(sql.contains("\nORDER BY Groups_Rank ASC\nLIMIT 10"));
        assert!(sql.starts_with("SELECT DisplayName\nFROM (\n"));
    }

    #[test]
    fn test_audited_column_requires_user() {
        let ctx = context();
        let gen = generator(DialectKind::Postgres);
        let request = SelectRequest::new(users(&ctx))
            .with_columns(select(&gen, &ctx, &["Email"]))
            .with_max_rows(MaxRows::Limit(1));

        let err = gen.get_select_sql(&ctx, request.clone()).unwrap_err();
        assert_eq!(err, QueryError::LoggingContextMissing);

        let ctx = ctx.with_user("auditor").with_container("/home");
        let result = generate(&gen, &ctx, request);
        assert!(result.fragment.sql().starts_with("SELECT Email\nFROM (\n"));
        assert!(result.fragment.sql().contains("Users.UserId AS UserId"));
        assert_eq!(result.logging.user.as_deref(), Some("auditor"));
        assert_eq!(result.logging.container.as_deref(), Some("/home"));
        assert_eq!(result.logging.comments, vec!["email address".to_string()]);
    }

    #[test]
    fn test_audited_lookup_column_logs_rebased_dependency() {
        let ctx = context().with_user("auditor");
        let gen = generator(DialectKind::Postgres);
        let request = SelectRequest::new(users(&ctx))
            .with_columns(select(&gen, &ctx, &["Groups/Owner/Email"]));
        let result = generate(&gen, &ctx, request);

        assert_eq!(
            result.logging.logged_columns,
            vec![FieldKey::from_string("Groups/Owner/Email")]
        );
        assert_eq!(
            result.logging.data_logging_columns,
            vec![FieldKey::from_string("Groups/Owner/UserId")]
        );
        assert!(result.fragment.sql().contains("AS Groups_Owner_UserId"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let ctx = context();
        let gen = generator(DialectKind::SqlServer);
        let request = || {
            let mut filter = Filter::new();
            filter.parse_url_clause("Groups/Name~contains=adm").unwrap();
            SelectRequest::new(users(&ctx))
                .with_columns(select(&gen, &ctx, &["UserId", "Groups/Owner/DisplayName"]))
                .with_filter(filter)
                .with_sort(Sort::parse_url("-Groups/Name"))
                .with_max_rows(MaxRows::Limit(25))
        };
        let first = generate(&gen, &ctx, request());
        let second = generate(&gen, &ctx, request());
        assert_eq!(first.fragment, second.fragment);
        assert_eq!(first.output_columns, second.output_columns);
    }

    #[test]
    fn test_bad_expression_degrades_unless_strict() {
        let ctx = context();
        let mut filter = Filter::new();
        filter.add_where_clause("Nope = 1");
        let request = SelectRequest::new(users(&ctx))
            .with_columns(select(&generator(DialectKind::Postgres), &ctx, &["UserId"]))
            .with_filter(filter);

        let result = generate(&generator(DialectKind::Postgres), &ctx, request.clone());
        assert!(result.fragment.sql().contains("\nWHERE 0=1"));
        assert_eq!(result.warnings.len(), 1);

        let strict = SqlGenerator::new(GeneratorConfig {
            strict_filters: true,
            ..GeneratorConfig::default()
        });
        let err = strict.get_select_sql(&ctx, request).unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilter(_)));
    }

    #[test]
    fn test_named_parameters_must_be_bound() {
        let ctx = context();
        let gen = generator(DialectKind::Postgres);
        let mut filter = Filter::new();
        filter.add_where_clause("UserId > $min");
        let request = SelectRequest::new(users(&ctx))
            .with_columns(select(&gen, &ctx, &["UserId"]))
            .with_filter(filter);
        let result = generate(&gen, &ctx, request);
        assert!(result.fragment.sql().contains("WHERE (x.UserId > ?)"));

        let err = validate_named_parameters(&result.fragment).unwrap_err();
        assert_eq!(err, QueryError::NamedParameterNotProvided("min".to_string()));

        let values = HashMap::from([("MIN".to_string(), json!(3))]);
        let bound = bind_named_parameters(&result.fragment, &values);
        assert!(validate_named_parameters(&bound).is_ok());
        assert_eq!(bound.params(), &[SqlParam::Value(json!(3))]);
    }

    #[test]
    fn test_sql_server_offset_uses_row_number() {
        let ctx = context();
        let gen = generator(DialectKind::SqlServer);
        let request = SelectRequest::new(users(&ctx))
            .with_columns(select(&gen, &ctx, &["UserId", "DisplayName"]))
            .with_sort(Sort::parse_url("-DisplayName"))
            .with_max_rows(MaxRows::Limit(10))
            .with_offset(20);
        let sql = generate(&gen, &ctx, request).fragment.sql().to_string();

        assert!(sql.starts_with(
            "SELECT * FROM (\nSELECT *,\nROW_NUMBER() OVER (\nORDER BY DisplayName DESC, UserId ASC) AS _RowNum\nFROM (\n"
        ), "{}", sql);
        assert!(sql.ends_with("WHERE _RowNum BETWEEN 21 AND 30\nORDER BY _RowNum"));
    }

    #[test]
    fn test_sql_server_top_and_2000_offset() {
        let ctx = context();
        let request = SelectRequest::new(users(&ctx))
            .with_columns(select(&generator(DialectKind::SqlServer2000), &ctx, &["UserId"]))
            .with_max_rows(MaxRows::Limit(3));

        let top = generate(&generator(DialectKind::SqlServer2000), &ctx, request.clone());
        assert!(top.fragment.sql().starts_with("SELECT TOP 3 *\nFROM (\n"));

        let err = generator(DialectKind::SqlServer2000)
            .get_select_sql(&ctx, request.with_offset(3))
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::Dialect(DialectError::UnsupportedPagination { .. })
        ));
    }

    #[test]
    fn test_no_rows_keeps_shape() {
        let ctx = context();
        let gen = generator(DialectKind::Postgres);
        let request = SelectRequest::new(users(&ctx))
            .with_columns(select(&gen, &ctx, &["UserId", "DisplayName"]))
            .with_max_rows(MaxRows::NoRows);
        let result = generate(&gen, &ctx, request);
        assert!(result.fragment.sql().ends_with("\nLIMIT 0"));
        assert_eq!(result.output_columns.len(), 2);
    }
}
