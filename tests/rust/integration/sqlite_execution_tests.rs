//! Executes generated PostgreSQL-dialect SQL against in-memory SQLite.
//!
//! The statements this crate emits (nested subquery, LEFT OUTER JOIN,
//! LIMIT/OFFSET, `||`) are accepted by SQLite, which makes it a convenient
//! check that generated SQL is not just well-formed text.

#[cfg(test)]
mod sqlite_execution_tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use rusqlite::types::Value as SqliteValue;
    use rusqlite::{params_from_iter, Connection};
    use serde_json::{json, Value};
    use viewsql::config::GeneratorConfig;
    use viewsql::dialect::MaxRows;
    use viewsql::query::{
        bind_named_parameters, validate_named_parameters, Filter, QueryContext, SelectRequest,
        Sort, SqlFragment, SqlGenerator, SqlParam,
    };
    use viewsql::schema::{ColumnInfo, FieldKey, TableInfo};

    use crate::test_schemas::context;

    const USER_COUNT: i64 = 15;

    fn database() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "ATTACH DATABASE ':memory:' AS core;
             CREATE TABLE core.Groups (GroupId INTEGER PRIMARY KEY, Name TEXT, Code TEXT, Rank INTEGER, Owner INTEGER);
             CREATE TABLE core.Users (UserId INTEGER PRIMARY KEY, DisplayName TEXT, Email TEXT, Groups INTEGER);
             INSERT INTO core.Groups VALUES (1, 'Admins', 'ADM', 2, 1), (2, 'Staff', 'STF', 1, 2);",
        )
        .unwrap();
        for id in 1..=USER_COUNT {
            conn.execute(
                "INSERT INTO core.Users VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    id,
                    format!("User {:02}", id),
                    format!("user{}@example.org", id),
                    if id % 2 == 1 { 1 } else { 2 }
                ],
            )
            .unwrap();
        }
        conn
    }

    fn sqlite_value(param: &SqlParam) -> SqliteValue {
        match param {
            SqlParam::Value(Value::Null) => SqliteValue::Null,
            SqlParam::Value(Value::Bool(b)) => SqliteValue::Integer(*b as i64),
            SqlParam::Value(Value::Number(n)) => match n.as_i64() {
                Some(i) => SqliteValue::Integer(i),
                None => SqliteValue::Real(n.as_f64().unwrap_or_default()),
            },
            SqlParam::Value(Value::String(s)) => SqliteValue::Text(s.clone()),
            SqlParam::Value(other) => SqliteValue::Text(other.to_string()),
            SqlParam::Named(named) => panic!("unbound parameter {}", named.name),
        }
    }

    /// Values of `column` for every row the fragment returns
    fn query_strings(conn: &Connection, fragment: &SqlFragment, column: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(fragment.sql())
            .unwrap_or_else(|e| panic!("{}\n{}", e, fragment.sql()));
        let rows = stmt
            .query_map(params_from_iter(fragment.params().iter().map(sqlite_value)), |row| {
                row.get::<_, String>(column)
            })
            .unwrap();
        rows.map(|r| r.unwrap()).collect()
    }

    fn users(ctx: &QueryContext) -> Arc<TableInfo> {
        ctx.catalog.table("core", "Users").unwrap()
    }

    fn select(gen: &SqlGenerator, ctx: &QueryContext, keys: &[&str]) -> Vec<Arc<ColumnInfo>> {
        let keys: Vec<FieldKey> = keys.iter().map(|k| FieldKey::from_string(k)).collect();
        gen.get_columns(ctx, &users(ctx), &keys, &[])
            .into_iter()
            .map(|(_, column)| column)
            .collect()
    }

    #[test]
    fn test_sorted_page_of_users() {
        let conn = database();
        let ctx = context();
        let gen = SqlGenerator::new(GeneratorConfig::default());
        let request = SelectRequest::new(users(&ctx))
            .with_columns(select(&gen, &ctx, &["UserId", "DisplayName", "Groups/Name"]))
            .with_sort(Sort::parse_url("-DisplayName"))
            .with_max_rows(MaxRows::Limit(10));
        let result = gen.get_select_sql(&ctx, request).unwrap();

        let names = query_strings(&conn, &result.fragment, "DisplayName");
        let expected: Vec<String> = (6..=15).rev().map(|i| format!("User {:02}", i)).collect();
        assert_eq!(names, expected);

        let groups = query_strings(&conn, &result.fragment, "Groups_Name");
        assert_eq!(groups[0], "Admins");
        assert_eq!(groups[1], "Staff");
    }

    #[test]
    fn test_filtered_offset_page() {
        let conn = database();
        let ctx = context();
        let gen = SqlGenerator::new(GeneratorConfig::default());
        let mut filter = Filter::new();
        filter.parse_url_clause("Groups/Name~eq=Admins").unwrap();
        filter.add_where_clause("UserId > $min");
        let request = SelectRequest::new(users(&ctx))
            .with_columns(select(&gen, &ctx, &["DisplayName"]))
            .with_filter(filter)
            .with_max_rows(MaxRows::Limit(100))
            .with_offset(2);
        let result = gen.get_select_sql(&ctx, request).unwrap();
        assert_eq!(result.output_columns.len(), 1);

        let values = HashMap::from([("min".to_string(), json!(3))]);
        let bound = bind_named_parameters(&result.fragment, &values);
        validate_named_parameters(&bound).unwrap();

        let names = query_strings(&conn, &bound, "DisplayName");
        assert_eq!(names, vec!["User 09", "User 11", "User 13", "User 15"]);
    }

    #[test]
    fn test_sort_substitute_orders_rows() {
        let conn = database();
        let ctx = context();
        let gen = SqlGenerator::new(GeneratorConfig::default());
        let request = SelectRequest::new(users(&ctx))
            .with_columns(select(&gen, &ctx, &["DisplayName", "Groups/Name"]))
            .with_sort(Sort::parse_url("Groups/Name,DisplayName"))
            .with_max_rows(MaxRows::Limit(3));
        let result = gen.get_select_sql(&ctx, request).unwrap();

        // Staff ranks ahead of Admins
        let groups = query_strings(&conn, &result.fragment, "Groups_Name");
        assert_eq!(groups, vec!["Staff", "Staff", "Staff"]);
        let names = query_strings(&conn, &result.fragment, "DisplayName");
        assert_eq!(names, vec!["User 02", "User 04", "User 06"]);
    }

    #[test]
    fn test_sort_on_lookup_parent_after_lookup_child() {
        let conn = database();
        let ctx = context();
        let gen = SqlGenerator::new(GeneratorConfig::default());
        let request = SelectRequest::new(users(&ctx))
            .with_columns(select(&gen, &ctx, &["DisplayName"]))
            .with_sort(Sort::parse_url("Groups/Code,Groups"))
            .with_max_rows(MaxRows::Limit(10));
        let result = gen.get_select_sql(&ctx, request).unwrap();
        assert!(result.fragment.sql().contains("Users.Groups AS Groups"));

        // ADM sorts before STF, so all eight Admins come first
        let names = query_strings(&conn, &result.fragment, "DisplayName");
        assert_eq!(names.len(), 10);
        let mut admins = names[..8].to_vec();
        admins.sort();
        let expected: Vec<String> = (1..=USER_COUNT)
            .filter(|i| i % 2 == 1)
            .map(|i| format!("User {:02}", i))
            .collect();
        assert_eq!(admins, expected);
    }

    #[test]
    fn test_sort_on_lookup_parent_of_filtered_column() {
        let conn = database();
        let ctx = context();
        let gen = SqlGenerator::new(GeneratorConfig::default());
        let mut filter = Filter::new();
        filter.parse_url_clause("Groups/Name~eq=Staff").unwrap();
        let request = SelectRequest::new(users(&ctx))
            .with_columns(select(&gen, &ctx, &["DisplayName"]))
            .with_filter(filter)
            .with_sort(Sort::parse_url("-Groups,DisplayName"))
            .with_max_rows(MaxRows::Limit(5));
        let result = gen.get_select_sql(&ctx, request).unwrap();
        assert!(result.unresolved.is_empty());

        let names = query_strings(&conn, &result.fragment, "DisplayName");
        assert_eq!(names, vec!["User 02", "User 04", "User 06", "User 08", "User 10"]);
    }

    #[test]
    fn test_contains_filter_and_flat_select_execute() {
        let conn = database();
        let ctx = context();
        let gen = SqlGenerator::new(GeneratorConfig::default());

        let flat = gen
            .get_select_sql(
                &ctx,
                SelectRequest::new(users(&ctx)).with_columns(select(&gen, &ctx, &["DisplayName"])),
            )
            .unwrap();
        assert!(!flat.fragment.sql().contains(") x"));
        assert_eq!(query_strings(&conn, &flat.fragment, "DisplayName").len(), USER_COUNT as usize);

        let mut filter = Filter::new();
        filter.parse_url_clause("DisplayName~contains=1").unwrap();
        let request = SelectRequest::new(users(&ctx))
            .with_columns(select(&gen, &ctx, &["DisplayName"]))
            .with_filter(filter)
            .with_sort(Sort::parse_url("DisplayName"));
        let result = gen.get_select_sql(&ctx, request).unwrap();
        let names = query_strings(&conn, &result.fragment, "DisplayName");
        assert_eq!(
            names,
            vec!["User 01", "User 10", "User 11", "User 12", "User 13", "User 14", "User 15"]
        );
    }
}
