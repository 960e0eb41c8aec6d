use std::fmt;

use crate::schema::FieldKey;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    /// Kept as written so no precision is lost
    Decimal(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Concat,
}

impl BinaryOp {
    /// SQL spelling; `Concat` is dialect-specific and handled by the binder
    pub fn sql(&self) -> &'static str {
        match self {
            BinaryOp::Or => "OR",
            BinaryOp::And => "AND",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "<>",
            BinaryOp::Less => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Concat => "||",
        }
    }
}

/// Filter expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column path: `Groups.Name`
    Identifier(FieldKey),
    Literal(Literal),
    /// Named parameter: `$minAge`
    Parameter(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    MethodCall {
        name: String,
        args: Vec<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
}

impl Expr {
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Free identifiers in first-seen order, without duplicates. Method names are not identifiers.
    pub fn collect_field_keys(&self) -> Vec<FieldKey> {
        let mut keys = Vec::new();
        self.collect_into(&mut keys);
        keys
    }

    fn collect_into(&self, keys: &mut Vec<FieldKey>) {
        match self {
            Expr::Identifier(key) => {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
            Expr::Literal(_) | Expr::Parameter(_) => {}
            Expr::Unary { operand, .. } => operand.collect_into(keys),
            Expr::Binary { left, right, .. } => {
                left.collect_into(keys);
                right.collect_into(keys);
            }
            Expr::MethodCall { args, .. } => {
                for arg in args {
                    arg.collect_into(keys);
                }
            }
            Expr::IsNull { expr, .. } => expr.collect_into(keys),
            Expr::In { expr, list, .. } => {
                expr.collect_into(keys);
                for item in list {
                    item.collect_into(keys);
                }
            }
            Expr::Between { expr, low, high, .. } => {
                expr.collect_into(keys);
                low.collect_into(keys);
                high.collect_into(keys);
            }
            Expr::Like { expr, pattern, .. } => {
                expr.collect_into(keys);
                pattern.collect_into(keys);
            }
        }
    }
}

fn not_kw(negated: bool) -> &'static str {
    if negated {
        "NOT "
    } else {
        ""
    }
}

/// Source-like rendering, used in warnings and logs
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Identifier(key) => write!(f, "{}", key.to_display_string()),
            Expr::Literal(Literal::String(s)) => write!(f, "'{}'", s.replace('\'', "''")),
            Expr::Literal(Literal::Integer(i)) => write!(f, "{}", i),
            Expr::Literal(Literal::Decimal(d)) => write!(f, "{}", d),
            Expr::Literal(Literal::Boolean(b)) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Expr::Literal(Literal::Null) => write!(f, "NULL"),
            Expr::Parameter(name) => write!(f, "${}", name),
            Expr::Unary { op: UnaryOp::Not, operand } => write!(f, "NOT {}", operand),
            Expr::Unary { op: UnaryOp::Negate, operand } => write!(f, "-{}", operand),
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op.sql(), right),
            Expr::MethodCall { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", name, args.join(", "))
            }
            Expr::IsNull { expr, negated } => write!(f, "{} IS {}NULL", expr, not_kw(*negated)),
            Expr::In { expr, list, negated } => {
                let list: Vec<String> = list.iter().map(|a| a.to_string()).collect();
                write!(f, "{} {}IN ({})", expr, not_kw(*negated), list.join(", "))
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => write!(f, "{} {}BETWEEN {} AND {}", expr, not_kw(*negated), low, high),
            Expr::Like {
                expr,
                pattern,
                negated,
            } => write!(f, "{} {}LIKE {}", expr, not_kw(*negated), pattern),
        }
    }
}
