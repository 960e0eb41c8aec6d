/// Filter method registry
///
/// Maps method names usable in filter expressions to dialect SQL, with arity
/// checks and optional per-dialect rendering.
use std::collections::HashMap;

use super::errors::BindError;
use crate::dialect::DialectKind;

/// Method mapping entry
#[derive(Clone)]
pub struct MethodMapping {
    /// Filter-language name (lowercase for lookup)
    pub name: &'static str,
    pub postgres_name: &'static str,
    pub sqlserver_name: &'static str,
    pub min_args: usize,
    /// `None` for variadic methods
    pub max_args: Option<usize>,
    /// Full rendering override, given the bound argument SQL
    pub render: Option<fn(DialectKind, &[String]) -> String>,
}

impl MethodMapping {
    fn simple(name: &'static str, sql_name: &'static str, args: usize) -> Self {
        MethodMapping {
            name,
            postgres_name: sql_name,
            sqlserver_name: sql_name,
            min_args: args,
            max_args: Some(args),
            render: None,
        }
    }

    fn expected(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }

    fn sql_name(&self, kind: DialectKind) -> &'static str {
        if kind.is_sql_server() {
            self.sqlserver_name
        } else {
            self.postgres_name
        }
    }
}

/// Get the mapping for a method name
pub fn get_method_mapping(name: &str) -> Option<MethodMapping> {
    METHOD_MAPPINGS.get(name.to_lowercase().as_str()).cloned()
}

/// Render a method call for `kind`
pub fn translate(kind: DialectKind, name: &str, args: &[String]) -> Result<String, BindError> {
    let mapping =
        get_method_mapping(name).ok_or_else(|| BindError::UnknownMethod(name.to_string()))?;

    let too_few = args.len() < mapping.min_args;
    let too_many = mapping.max_args.is_some_and(|max| args.len() > max);
    if too_few || too_many {
        return Err(BindError::WrongArgumentCount {
            name: mapping.name.to_string(),
            expected: mapping.expected(),
            found: args.len(),
        });
    }

    if let Some(render) = mapping.render {
        return Ok(render(kind, args));
    }
    Ok(format!("{}({})", mapping.sql_name(kind), args.join(", ")))
}

fn date_part(kind: DialectKind, part: &str, arg: &str) -> String {
    if kind.is_sql_server() {
        format!("{}({})", part, arg)
    } else {
        format!("EXTRACT({} FROM {})", part, arg)
    }
}

lazy_static::lazy_static! {
    static ref METHOD_MAPPINGS: HashMap<&'static str, MethodMapping> = {
        let mut m = HashMap::new();

        // ===== STRING METHODS =====

        for (name, sql) in [("lower", "LOWER"), ("lcase", "LOWER"), ("upper", "UPPER"), ("ucase", "UPPER")] {
            m.insert(name, MethodMapping::simple(name, sql, 1));
        }
        m.insert("ltrim", MethodMapping::simple("ltrim", "LTRIM", 1));
        m.insert("rtrim", MethodMapping::simple("rtrim", "RTRIM", 1));

        m.insert("length", MethodMapping {
            sqlserver_name: "LEN",
            ..MethodMapping::simple("length", "LENGTH", 1)
        });

        // trim(x) -> LTRIM(RTRIM(x)) on SQL Server
        m.insert("trim", MethodMapping {
            render: Some(|kind, args| {
                if kind.is_sql_server() {
                    format!("LTRIM(RTRIM({}))", args[0])
                } else {
                    format!("TRIM({})", args[0])
                }
            }),
            ..MethodMapping::simple("trim", "TRIM", 1)
        });

        // substring(s, start[, len]); SQL Server requires the length
        m.insert("substring", MethodMapping {
            name: "substring",
            postgres_name: "SUBSTR",
            sqlserver_name: "SUBSTRING",
            min_args: 2,
            max_args: Some(3),
            render: Some(|kind, args| {
                if kind.is_sql_server() && args.len() == 2 {
                    format!("SUBSTRING({}, {}, LEN({}))", args[0], args[1], args[0])
                } else if kind.is_sql_server() {
                    format!("SUBSTRING({})", args.join(", "))
                } else {
                    format!("SUBSTR({})", args.join(", "))
                }
            }),
        });

        // concat(a, b, ...); SQL Server 2000 has no CONCAT
        m.insert("concat", MethodMapping {
            name: "concat",
            postgres_name: "CONCAT",
            sqlserver_name: "CONCAT",
            min_args: 1,
            max_args: None,
            render: Some(|kind, args| {
                if kind == DialectKind::SqlServer2000 {
                    format!("({})", args.join(" + "))
                } else {
                    format!("CONCAT({})", args.join(", "))
                }
            }),
        });

        // ===== NUMERIC METHODS =====

        m.insert("abs", MethodMapping::simple("abs", "ABS", 1));
        m.insert("floor", MethodMapping::simple("floor", "FLOOR", 1));
        m.insert("ceiling", MethodMapping {
            postgres_name: "CEIL",
            ..MethodMapping::simple("ceiling", "CEILING", 1)
        });

        // round(x[, places]); SQL Server requires the places
        m.insert("round", MethodMapping {
            name: "round",
            postgres_name: "ROUND",
            sqlserver_name: "ROUND",
            min_args: 1,
            max_args: Some(2),
            render: Some(|kind, args| {
                if kind.is_sql_server() && args.len() == 1 {
                    format!("ROUND({}, 0)", args[0])
                } else {
                    format!("ROUND({})", args.join(", "))
                }
            }),
        });

        m.insert("mod", MethodMapping {
            render: Some(|kind, args| {
                if kind.is_sql_server() {
                    format!("({} % {})", args[0], args[1])
                } else {
                    format!("MOD({}, {})", args[0], args[1])
                }
            }),
            ..MethodMapping::simple("mod", "MOD", 2)
        });

        // ===== NULL HANDLING =====

        m.insert("coalesce", MethodMapping {
            name: "coalesce",
            postgres_name: "COALESCE",
            sqlserver_name: "COALESCE",
            min_args: 1,
            max_args: None,
            render: None,
        });
        m.insert("ifnull", MethodMapping {
            sqlserver_name: "ISNULL",
            ..MethodMapping::simple("ifnull", "COALESCE", 2)
        });

        // ===== DATE METHODS =====

        m.insert("year", MethodMapping {
            render: Some(|kind, args| date_part(kind, "YEAR", &args[0])),
            ..MethodMapping::simple("year", "YEAR", 1)
        });
        m.insert("month", MethodMapping {
            render: Some(|kind, args| date_part(kind, "MONTH", &args[0])),
            ..MethodMapping::simple("month", "MONTH", 1)
        });
        m.insert("day", MethodMapping {
            render: Some(|kind, args| date_part(kind, "DAY", &args[0])),
            ..MethodMapping::simple("day", "DAY", 1)
        });
        m.insert("now", MethodMapping {
            render: Some(|kind, _| {
                if kind.is_sql_server() {
                    "GETDATE()".to_string()
                } else {
                    "CURRENT_TIMESTAMP".to_string()
                }
            }),
            ..MethodMapping::simple("now", "NOW", 0)
        });

        m
    };
}
