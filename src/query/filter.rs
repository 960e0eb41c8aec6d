/// Filter model
///
/// A filter is an AND-ed list of clauses. Simple comparisons reference one
/// field key and carry their values as parameters; expression clauses hold
/// ad hoc filter text that is parsed and bound at generation time.
///
/// URL form for comparisons: `Name~eq=Bob`, `Groups/Name~in=a;b`.
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use super::column_resolver::ColumnMap;
use super::errors::QueryError;
use super::fragment::{SqlFragment, SqlParam};
use crate::dialect::SqlDialect;
use crate::expression::{bind, parse_expression, BindContext, Expr};
use crate::schema::{ColumnInfo, FieldKey, JdbcType};

const ALWAYS_TRUE: &str = "1=1";
const ALWAYS_FALSE: &str = "0=1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareType {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    IsBlank,
    IsNonBlank,
    In,
    NotIn,
    Contains,
    DoesNotContain,
    StartsWith,
}

impl CompareType {
    const ALL: [CompareType; 13] = [
        CompareType::Eq,
        CompareType::Neq,
        CompareType::Gt,
        CompareType::Gte,
        CompareType::Lt,
        CompareType::Lte,
        CompareType::IsBlank,
        CompareType::IsNonBlank,
        CompareType::In,
        CompareType::NotIn,
        CompareType::Contains,
        CompareType::DoesNotContain,
        CompareType::StartsWith,
    ];

    pub fn url_key(&self) -> &'static str {
        match self {
            CompareType::Eq => "eq",
            CompareType::Neq => "neq",
            CompareType::Gt => "gt",
            CompareType::Gte => "gte",
            CompareType::Lt => "lt",
            CompareType::Lte => "lte",
            CompareType::IsBlank => "isblank",
            CompareType::IsNonBlank => "isnonblank",
            CompareType::In => "in",
            CompareType::NotIn => "notin",
            CompareType::Contains => "contains",
            CompareType::DoesNotContain => "doesnotcontain",
            CompareType::StartsWith => "startswith",
        }
    }

    pub fn from_url_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.url_key().eq_ignore_ascii_case(key.trim()))
    }

    /// Whether the operator takes a list of values
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, CompareType::In | CompareType::NotIn)
    }

    /// Whether the operator ignores values entirely
    pub fn is_unary(&self) -> bool {
        matches!(self, CompareType::IsBlank | CompareType::IsNonBlank)
    }
}

impl fmt::Display for CompareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url_key())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterClause {
    Compare {
        field: FieldKey,
        op: CompareType,
        values: Vec<SqlParam>,
    },
    Expression {
        text: String,
    },
}

/// Rendering inputs for [`Filter::sql_fragment`]
pub struct FilterBinding<'a> {
    pub dialect: &'a dyn SqlDialect,
    pub columns: &'a ColumnMap,
    pub table_alias: Option<&'a str>,
    /// Fail instead of degrading unparseable or unbindable clauses to `0=1`
    pub strict: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<FilterClause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn add_clause(&mut self, clause: FilterClause) -> &mut Self {
        self.clauses.push(clause);
        self
    }

    /// Single-valued comparison; the value is ignored by `isblank`/`isnonblank`
    pub fn add_condition(
        &mut self,
        field: FieldKey,
        op: CompareType,
        value: impl Into<SqlParam>,
    ) -> &mut Self {
        let values = if op.is_unary() {
            Vec::new()
        } else {
            vec![value.into()]
        };
        self.add_clause(FilterClause::Compare { field, op, values })
    }

    pub fn add_in_clause(&mut self, field: FieldKey, values: Vec<Value>) -> &mut Self {
        self.add_clause(FilterClause::Compare {
            field,
            op: CompareType::In,
            values: values.into_iter().map(SqlParam::Value).collect(),
        })
    }

    /// Ad hoc expression text, e.g. `Age > 21 AND Groups.Name LIKE 'A%'`
    pub fn add_where_clause(&mut self, text: impl Into<String>) -> &mut Self {
        self.add_clause(FilterClause::Expression { text: text.into() })
    }

    /// Add a comparison in URL form: `Name~eq=Bob`, `Status~in=a;b`, `Email~isblank`
    pub fn parse_url_clause(&mut self, text: &str) -> Result<&mut Self, QueryError> {
        let (lhs, raw_value) = match text.split_once('=') {
            Some((lhs, value)) => (lhs, Some(value)),
            None => (text, None),
        };
        let (field, op_key) = lhs
            .rsplit_once('~')
            .ok_or_else(|| QueryError::InvalidFilter(format!("Missing '~operator' in '{}'", text)))?;
        if field.trim().is_empty() {
            return Err(QueryError::InvalidFilter(format!("Missing field in '{}'", text)));
        }
        let op = CompareType::from_url_key(op_key).ok_or_else(|| {
            QueryError::InvalidFilter(format!("Unknown comparison '{}' in '{}'", op_key, text))
        })?;

        let raw_value = raw_value.unwrap_or("");
        let values: Vec<SqlParam> = if op.is_unary() {
            Vec::new()
        } else if op.is_multi_valued() {
            raw_value
                .split(';')
                .map(|v| SqlParam::Value(url_value(v)))
                .collect()
        } else {
            vec![SqlParam::Value(url_value(raw_value))]
        };

        Ok(self.add_clause(FilterClause::Compare {
            field: FieldKey::from_string(field.trim()),
            op,
            values,
        }))
    }

    /// Every field key the filter references, first-seen order.
    ///
    /// Identifiers of unparseable expression clauses are not reported; those
    /// clauses degrade when rendered.
    pub fn where_param_field_keys(&self) -> Vec<FieldKey> {
        let mut keys: Vec<FieldKey> = Vec::new();
        for clause in &self.clauses {
            let clause_keys = match clause {
                FilterClause::Compare { field, .. } => vec![field.clone()],
                FilterClause::Expression { text } => match parse_expression(text) {
                    Ok(expr) => expr.collect_field_keys(),
                    Err(_) => Vec::new(),
                },
            };
            for key in clause_keys {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Remove comparisons on `field`. Expression clauses are kept.
    pub fn delete_conditions(&mut self, field: &FieldKey) -> bool {
        let before = self.clauses.len();
        self.clauses.retain(|clause| match clause {
            FilterClause::Compare { field: f, .. } => f != field,
            FilterClause::Expression { .. } => true,
        });
        before != self.clauses.len()
    }

    /// `WHERE …` over the bound clauses, or `None` for an empty filter.
    ///
    /// Clauses that cannot be parsed or bound become `0=1` and add a message
    /// to `warnings`, unless the binding is strict.
    pub fn sql_fragment(
        &self,
        binding: &FilterBinding<'_>,
        warnings: &mut Vec<String>,
    ) -> Result<Option<SqlFragment>, QueryError> {
        if self.clauses.is_empty() {
            return Ok(None);
        }

        let mut out = SqlFragment::from_sql("WHERE ");
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                out.append(" AND ");
            }
            let fragment = match clause {
                FilterClause::Compare { field, op, values } => {
                    compare_sql(field, *op, values, binding, warnings)?
                }
                FilterClause::Expression { text } => expression_sql(text, binding, warnings)?,
            };
            out.append_fragment(&fragment);
        }
        Ok(Some(out))
    }
}

/// URL values are strings; an empty value means NULL
fn url_value(raw: &str) -> Value {
    if raw.is_empty() {
        Value::Null
    } else {
        Value::String(raw.to_string())
    }
}

fn degrade(message: String, binding: &FilterBinding<'_>, warnings: &mut Vec<String>) -> Result<SqlFragment, QueryError> {
    if binding.strict {
        return Err(QueryError::InvalidFilter(message));
    }
    log::warn!("{}; substituting {}", message, ALWAYS_FALSE);
    warnings.push(message);
    Ok(SqlFragment::from_sql(ALWAYS_FALSE))
}

fn expression_sql(
    text: &str,
    binding: &FilterBinding<'_>,
    warnings: &mut Vec<String>,
) -> Result<SqlFragment, QueryError> {
    if text.trim().is_empty() {
        return Ok(SqlFragment::from_sql(ALWAYS_TRUE));
    }
    let expr = match parse_expression(text) {
        Ok(expr) => expr,
        Err(errors) => {
            return degrade(
                format!("Unable to parse filter '{}': {}", text, errors),
                binding,
                warnings,
            )
        }
    };
    let ctx = BindContext {
        dialect: binding.dialect,
        columns: binding.columns,
        table_alias: binding.table_alias,
    };
    match bind(&expr, &ctx) {
        // binary expressions arrive parenthesized
        Ok(bound) if matches!(expr, Expr::Binary { .. }) => Ok(bound),
        Ok(bound) => {
            let mut out = SqlFragment::from_sql("(");
            out.append_fragment(&bound).append(")");
            Ok(out)
        }
        Err(e) => degrade(format!("Unable to bind filter '{}': {}", text, e), binding, warnings),
    }
}

fn compare_sql(
    field: &FieldKey,
    op: CompareType,
    values: &[SqlParam],
    binding: &FilterBinding<'_>,
    warnings: &mut Vec<String>,
) -> Result<SqlFragment, QueryError> {
    let Some(column) = binding.columns.get(field) else {
        return degrade(
            format!("Column '{}' not found for filter", field.to_display_string()),
            binding,
            warnings,
        );
    };
    let ident = binding.dialect.make_legal_identifier(column.alias());
    let col = match binding.table_alias {
        Some(alias) => format!("{}.{}", alias, ident),
        None => ident,
    };
    let values: Vec<SqlParam> = values.iter().map(|v| convert_value(v, column)).collect();
    let concat = binding.dialect.concatenation_operator();
    let first = values.first().filter(|v| !is_null(v)).cloned();

    let mut out = SqlFragment::new();
    match op {
        CompareType::IsBlank => {
            out.append(&format!("{} IS NULL", col));
        }
        CompareType::IsNonBlank => {
            out.append(&format!("{} IS NOT NULL", col));
        }
        CompareType::Eq | CompareType::Neq | CompareType::Gt | CompareType::Gte
        | CompareType::Lt | CompareType::Lte => match first {
            None if op == CompareType::Eq => {
                out.append(&format!("{} IS NULL", col));
            }
            None if op == CompareType::Neq => {
                out.append(&format!("{} IS NOT NULL", col));
            }
            None => {
                return degrade(
                    format!("Comparison '{}' on '{}' needs a value", op, field.to_display_string()),
                    binding,
                    warnings,
                )
            }
            Some(value) => {
                let sql_op = match op {
                    CompareType::Eq => "=",
                    CompareType::Neq => "<>",
                    CompareType::Gt => ">",
                    CompareType::Gte => ">=",
                    CompareType::Lt => "<",
                    _ => "<=",
                };
                out.append(&format!("{} {} ?", col, sql_op)).append_param(value);
            }
        },
        CompareType::In | CompareType::NotIn => {
            let negated = op == CompareType::NotIn;
            let with_null = values.iter().any(is_null);
            let non_null: Vec<&SqlParam> = values.iter().filter(|v| !is_null(v)).collect();
            if non_null.is_empty() && !with_null {
                out.append(if negated { ALWAYS_TRUE } else { ALWAYS_FALSE });
                return Ok(out);
            }

            out.append("(");
            if !non_null.is_empty() {
                let marks = vec!["?"; non_null.len()].join(", ");
                out.append(&format!("{} {}IN ({})", col, if negated { "NOT " } else { "" }, marks));
                for value in non_null.iter() {
                    out.append_param((*value).clone());
                }
            }
            match (with_null, negated, non_null.is_empty()) {
                (true, false, true) => out.append(&format!("{} IS NULL", col)),
                (true, false, false) => out.append(&format!(" OR {} IS NULL", col)),
                (true, true, true) => out.append(&format!("{} IS NOT NULL", col)),
                (true, true, false) => out.append(&format!(" AND {} IS NOT NULL", col)),
                (false, true, _) => out.append(&format!(" OR {} IS NULL", col)),
                (false, false, _) => &mut out,
            };
            out.append(")");
        }
        CompareType::Contains | CompareType::DoesNotContain | CompareType::StartsWith => {
            let Some(value) = first else {
                out.append(ALWAYS_TRUE);
                return Ok(out);
            };
            let pattern = match op {
                CompareType::StartsWith => format!("? {} '%'", concat),
                _ => format!("'%' {} ? {} '%'", concat, concat),
            };
            if op == CompareType::DoesNotContain {
                out.append(&format!("({} IS NULL OR {} NOT LIKE {})", col, col, pattern));
            } else {
                out.append(&format!("{} LIKE {}", col, pattern));
            }
            out.append_param(value);
        }
    }
    Ok(out)
}

fn is_null(param: &SqlParam) -> bool {
    matches!(param, SqlParam::Value(Value::Null))
}

/// Convert string values to the column's type where they parse
fn convert_value(param: &SqlParam, column: &ColumnInfo) -> SqlParam {
    let SqlParam::Value(Value::String(s)) = param else {
        return param.clone();
    };
    let text = s.trim();
    let converted = match column.jdbc_type {
        JdbcType::Boolean => match text.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(Value::Bool(true)),
            "false" | "0" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        t if t.is_numeric() => text
            .parse::<i64>()
            .ok()
            .map(Value::from)
            .or_else(|| text.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)),
        _ => None,
    };
    match converted {
        Some(value) => SqlParam::Value(value),
        None => param.clone(),
    }
}
