//! Binds a parsed filter expression to resolved columns.
//!
//! Identifiers become the dialect-legal aliases of their columns, qualified
//! by the subquery alias when one is given. Literals are inlined, `$name`
//! parameters become `?` placeholders carrying a named parameter, and method
//! calls go through the method registry.

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use super::errors::BindError;
use super::methods;
use crate::dialect::SqlDialect;
use crate::query::column_resolver::ColumnMap;
use crate::query::fragment::{escape_string, SqlFragment, SqlParam};

/// Marks argument slots in rendered method SQL
const ARG_MARK: char = '\u{1}';

pub struct BindContext<'a> {
    pub dialect: &'a dyn SqlDialect,
    pub columns: &'a ColumnMap,
    pub table_alias: Option<&'a str>,
}

pub fn bind(expr: &Expr, ctx: &BindContext<'_>) -> Result<SqlFragment, BindError> {
    let mut out = SqlFragment::new();
    bind_into(expr, ctx, &mut out)?;
    Ok(out)
}

fn bind_into(expr: &Expr, ctx: &BindContext<'_>, out: &mut SqlFragment) -> Result<(), BindError> {
    match expr {
        Expr::Identifier(key) => {
            let column = ctx
                .columns
                .get(key)
                .ok_or_else(|| BindError::UnknownColumn(key.to_display_string()))?;
            let ident = ctx.dialect.make_legal_identifier(column.alias());
            match ctx.table_alias {
                Some(alias) => out.append(&format!("{}.{}", alias, ident)),
                None => out.append(&ident),
            };
        }
        Expr::Literal(literal) => {
            out.append(&literal_sql(literal, ctx.dialect));
        }
        Expr::Parameter(name) => {
            out.append("?").append_param(SqlParam::named(name.clone()));
        }
        Expr::Unary { op, operand } => {
            out.append(match op {
                UnaryOp::Not => "NOT (",
                UnaryOp::Negate => "-(",
            });
            bind_into(operand, ctx, out)?;
            out.append(")");
        }
        Expr::Binary { op, left, right } => {
            let op_sql = match op {
                BinaryOp::Concat => ctx.dialect.concatenation_operator(),
                other => other.sql(),
            };
            out.append("(");
            bind_into(left, ctx, out)?;
            out.append(&format!(" {} ", op_sql));
            bind_into(right, ctx, out)?;
            out.append(")");
        }
        Expr::MethodCall { name, args } => bind_method(name, args, ctx, out)?,
        Expr::IsNull { expr, negated } => {
            bind_into(expr, ctx, out)?;
            out.append(if *negated { " IS NOT NULL" } else { " IS NULL" });
        }
        Expr::In { expr, list, negated } => {
            bind_into(expr, ctx, out)?;
            out.append(if *negated { " NOT IN (" } else { " IN (" });
            for (i, item) in list.iter().enumerate() {
                if i > 0 {
                    out.append(", ");
                }
                bind_into(item, ctx, out)?;
            }
            out.append(")");
        }
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            bind_into(expr, ctx, out)?;
            out.append(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
            bind_into(low, ctx, out)?;
            out.append(" AND ");
            bind_into(high, ctx, out)?;
        }
        Expr::Like {
            expr,
            pattern,
            negated,
        } => {
            bind_into(expr, ctx, out)?;
            out.append(if *negated { " NOT LIKE " } else { " LIKE " });
            bind_into(pattern, ctx, out)?;
        }
    }
    Ok(())
}

/// Renders the method around argument markers, then splices the bound
/// arguments in so their parameters follow the final text order.
fn bind_method(
    name: &str,
    args: &[Expr],
    ctx: &BindContext<'_>,
    out: &mut SqlFragment,
) -> Result<(), BindError> {
    let bound: Vec<SqlFragment> = args
        .iter()
        .map(|arg| bind(arg, ctx))
        .collect::<Result<_, _>>()?;
    let markers: Vec<String> = (0..bound.len())
        .map(|i| format!("{}{}{}", ARG_MARK, i, ARG_MARK))
        .collect();
    let rendered = methods::translate(ctx.dialect.kind(), name, &markers)?;

    for (i, piece) in rendered.split(ARG_MARK).enumerate() {
        if i % 2 == 0 {
            out.append(piece);
        } else if let Some(arg) = piece.parse::<usize>().ok().and_then(|n| bound.get(n)) {
            out.append_fragment(arg);
        }
    }
    Ok(())
}

fn literal_sql(literal: &Literal, dialect: &dyn SqlDialect) -> String {
    match literal {
        Literal::String(s) => format!("'{}'", escape_string(s)),
        Literal::Integer(i) => i.to_string(),
        Literal::Decimal(d) => d.clone(),
        Literal::Boolean(b) => dialect.boolean_literal(*b).to_string(),
        Literal::Null => "NULL".to_string(),
    }
}
