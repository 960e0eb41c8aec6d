//! Identifier legality across dialects and aliases of awkward column names

#[cfg(test)]
mod naming_tests {
    use std::sync::Arc;

    use test_case::test_case;
    use viewsql::config::GeneratorConfig;
    use viewsql::dialect::DialectKind;
    use viewsql::query::{make_legal_name, QueryContext, SelectRequest, SqlGenerator};
    use viewsql::schema::{FieldKey, SchemaConfig};

    #[test_case(DialectKind::Postgres, "Limit", "\"Limit\"" ; "postgres reserves limit")]
    #[test_case(DialectKind::SqlServer, "Limit", "Limit" ; "sql server allows limit")]
    #[test_case(DialectKind::SqlServer, "Top", "\"Top\"" ; "sql server reserves top")]
    #[test_case(DialectKind::Postgres, "Top", "Top" ; "postgres allows top")]
    #[test_case(DialectKind::SqlServer2000, "Key", "\"Key\"" ; "sql server reserves key")]
    #[test_case(DialectKind::Postgres, "Display Name", "\"Display Name\"" ; "space needs quoting")]
    fn test_legal_identifier(kind: DialectKind, name: &str, expected: &str) {
        assert_eq!(kind.dialect().make_legal_identifier(name), expected);
    }

    #[test_case(DialectKind::Postgres, 63 ; "postgres limit")]
    #[test_case(DialectKind::SqlServer, 128 ; "sql server limit")]
    fn test_legal_names_respect_length(kind: DialectKind, max: usize) {
        let dialect = kind.dialect();
        let legal = make_legal_name(&"Column/".repeat(40), dialect.as_ref());
        assert_eq!(legal.len(), max);
    }

    const AWKWARD_YAML: &str = r#"
schemas:
  - name: sales
    tables:
      - name: Order Lines
        columns:
          - name: Line Id
            type: integer
            key: true
          - name: select
          - name: Amount
            physical_name: amt
"#;

    #[test]
    fn test_awkward_names_in_generated_sql() {
        let catalog = SchemaConfig::from_yaml_str(AWKWARD_YAML)
            .unwrap()
            .into_catalog()
            .unwrap();
        let ctx = QueryContext::new(Arc::new(catalog));
        let table = ctx.catalog.table("sales", "Order Lines").unwrap();
        let gen = SqlGenerator::new(GeneratorConfig::default());
        let keys = vec![
            FieldKey::from_name("Line Id"),
            FieldKey::from_name("select"),
            FieldKey::from_name("Amount"),
        ];
        let columns = gen
            .get_columns(&ctx, &table, &keys, &[])
            .into_iter()
            .map(|(_, c)| c)
            .collect();

        let result = gen
            .get_select_sql(&ctx, SelectRequest::new(Arc::clone(&table)).with_columns(columns))
            .unwrap();
        assert_eq!(
            result.fragment.sql(),
            "SELECT \nOrder_Lines.\"Line Id\" AS Line_Id,\nOrder_Lines.\"select\" AS \"select\",\n\
             Order_Lines.amt AS Amount\nFROM sales.\"Order Lines\" Order_Lines "
        );
        let aliases: Vec<&str> = result.output_columns.iter().map(|c| c.alias.as_str()).collect();
        assert_eq!(aliases, vec!["Line_Id", "select", "Amount"]);
    }
}
