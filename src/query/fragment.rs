/// SQL fragments with positional parameters
///
/// A fragment is SQL text where every `?` outside string literals and quoted
/// identifiers is a placeholder for the parameter at the same position.
/// Parameters are either concrete JSON values or named parameters (`$name`
/// in filter expressions) that the caller binds before execution.
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use super::errors::QueryError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedParameter {
    pub name: String,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SqlParam {
    Value(Value),
    Named(NamedParameter),
}

impl SqlParam {
    pub fn named(name: impl Into<String>) -> Self {
        SqlParam::Named(NamedParameter {
            name: name.into(),
            default: None,
        })
    }
}

impl From<Value> for SqlParam {
    fn from(value: Value) -> Self {
        SqlParam::Value(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SqlFragment {
    sql: String,
    params: Vec<SqlParam>,
}

impl SqlFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sql(sql: impl Into<String>) -> Self {
        SqlFragment {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }

    pub fn append(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    pub fn append_fragment(&mut self, other: &SqlFragment) -> &mut Self {
        self.sql.push_str(&other.sql);
        self.params.extend(other.params.iter().cloned());
        self
    }

    /// Append a `?` placeholder bound to `param`
    pub fn append_param(&mut self, param: impl Into<SqlParam>) -> &mut Self {
        self.sql.push('?');
        self.params.push(param.into());
        self
    }

    /// Insert parameter-free text at a byte offset
    pub fn insert_sql(&mut self, at: usize, sql: &str) {
        self.sql.insert_str(at, sql);
    }

    /// Names of named parameters that are still unbound, in placeholder order
    pub fn named_parameters(&self) -> Vec<&NamedParameter> {
        self.params
            .iter()
            .filter_map(|p| match p {
                SqlParam::Named(named) => Some(named),
                SqlParam::Value(_) => None,
            })
            .collect()
    }

    /// Inline every parameter as a literal. For logs and the CLI only; never execute the result.
    pub fn to_debug_sql(&self) -> String {
        let mut result = String::with_capacity(self.sql.len() + self.params.len() * 8);
        let mut params = self.params.iter();
        let mut quote: Option<char> = None;

        for ch in self.sql.chars() {
            match quote {
                Some(q) => {
                    if ch == q {
                        quote = None;
                    }
                    result.push(ch);
                }
                None if ch == '\'' || ch == '"' => {
                    quote = Some(ch);
                    result.push(ch);
                }
                None if ch == '?' => match params.next() {
                    Some(SqlParam::Value(value)) => result.push_str(&format_literal(value)),
                    Some(SqlParam::Named(named)) => match &named.default {
                        Some(value) => result.push_str(&format_literal(value)),
                        None => {
                            result.push('$');
                            result.push_str(&named.name);
                        }
                    },
                    None => result.push('?'),
                },
                None => result.push(ch),
            }
        }
        result
    }
}

impl From<&str> for SqlFragment {
    fn from(sql: &str) -> Self {
        SqlFragment::from_sql(sql)
    }
}

impl From<String> for SqlFragment {
    fn from(sql: String) -> Self {
        SqlFragment::from_sql(sql)
    }
}

/// Escape a string for use inside a single-quoted SQL literal
pub fn escape_string(s: &str) -> String {
    s.replace('\'', "''")
}

/// Format a JSON value as an SQL literal
pub fn format_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", escape_string(s)),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Value::Null => "NULL".to_string(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(format_literal).collect();
            format!("({})", items.join(", "))
        }
        Value::Object(_) => format!("'{}'", escape_string(&value.to_string())),
    }
}

/// Replace named parameters with caller values or their declared defaults.
///
/// Names match case-insensitively. Parameters with neither a value nor a
/// default stay named; [`validate_named_parameters`] reports them.
pub fn bind_named_parameters(fragment: &SqlFragment, values: &HashMap<String, Value>) -> SqlFragment {
    let lookup: HashMap<String, &Value> = values
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect();

    let params = fragment
        .params
        .iter()
        .map(|param| match param {
            SqlParam::Named(named) => {
                match lookup.get(&named.name.to_ascii_lowercase()) {
                    Some(value) => SqlParam::Value((*value).clone()),
                    None => match &named.default {
                        Some(default) => SqlParam::Value(default.clone()),
                        None => param.clone(),
                    },
                }
            }
            SqlParam::Value(_) => param.clone(),
        })
        .collect();

    SqlFragment {
        sql: fragment.sql.clone(),
        params,
    }
}

/// Fail if any named parameter is still unbound
pub fn validate_named_parameters(fragment: &SqlFragment) -> Result<(), QueryError> {
    match fragment.named_parameters().first() {
        Some(named) => Err(QueryError::NamedParameterNotProvided(named.name.clone())),
        None => Ok(()),
    }
}
