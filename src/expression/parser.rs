/// Filter expression parser
///
/// Parses ad hoc boolean filter text into an [`Expr`] tree:
/// - Comparison operators: `=`, `<>`, `!=`, `<`, `<=`, `>`, `>=`
/// - Boolean operators: `AND`, `OR`, `NOT`
/// - Special predicates: `IN`, `BETWEEN`, `LIKE`, `IS NULL`, `IS NOT NULL`
/// - Arithmetic: `+`, `-`, `*`, `/`, `%`, and `||` for concatenation
/// - Method calls: `lower(Name)`, `coalesce(a, b, 0)`
/// - Paths through lookups: `Groups.Owner.Email`, `"Display Name"`
/// - Named parameters: `$minAge`
///
/// Examples:
/// - `DisplayName LIKE 'A%' AND Groups.Name IN ('Admins', 'Staff')`
/// - `Age BETWEEN $low AND $high OR Email IS NULL`
///
/// Keywords are case-insensitive. Before parsing, the text is scanned for
/// unterminated literals and unbalanced parentheses so those are reported
/// together with their positions.
///
/// Nesting (parentheses, `NOT`, unary minus, call arguments) and operator
/// chains share one depth budget of [`MAX_EXPRESSION_DEPTH`]; deeper input is
/// a parse error rather than unbounded recursion.
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0},
    combinator::{opt, recognize},
    error::{Error, ErrorKind},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, preceded},
    IResult, Parser,
};

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use super::errors::{ParseError, ParseErrors};
use crate::schema::FieldKey;

/// Maximum tree depth of a parsed expression
pub const MAX_EXPRESSION_DEPTH: usize = 100;

const KEYWORDS: [&str; 10] = [
    "AND", "OR", "NOT", "IS", "NULL", "IN", "BETWEEN", "LIKE", "TRUE", "FALSE",
];

/// Parse a complete filter expression
pub fn parse_expression(text: &str) -> Result<Expr, ParseErrors> {
    if text.trim().is_empty() {
        return Err(ParseErrors(vec![ParseError::new("Empty expression")]));
    }

    let lexical = lexical_errors(text);
    if !lexical.is_empty() {
        return Err(ParseErrors(lexical));
    }

    match parse_or_expr(text, 0) {
        Ok((rest, expr)) => {
            let rest = rest.trim_start();
            if rest.is_empty() {
                Ok(expr)
            } else {
                Err(ParseErrors(vec![ParseError::at(
                    format!("Unexpected trailing content: '{}'", snippet(rest)),
                    text.len() - rest.len(),
                )]))
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let position = text.len() - e.input.len();
            let message = if e.code == ErrorKind::TooLarge {
                format!(
                    "Expression is nested deeper than {} levels",
                    MAX_EXPRESSION_DEPTH
                )
            } else if e.input.trim().is_empty() {
                "Unexpected end of expression".to_string()
            } else {
                format!("Syntax error near '{}'", snippet(e.input))
            };
            Err(ParseErrors(vec![ParseError::at(message, position)]))
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseErrors(vec![ParseError::at(
            "Unexpected end of expression",
            text.len(),
        )])),
    }
}

fn snippet(input: &str) -> String {
    input.trim().chars().take(20).collect()
}

/// Unterminated quotes and unbalanced parentheses
fn lexical_errors(text: &str) -> Vec<ParseError> {
    let mut errors = Vec::new();
    let mut open_parens: Vec<usize> = Vec::new();
    let mut quote: Option<(char, usize)> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        if let Some((q, _)) = quote {
            if ch == q {
                // doubled quote is an escaped quote
                if chars.peek().map(|(_, c)| *c) == Some(q) {
                    chars.next();
                } else {
                    quote = None;
                }
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some((ch, pos)),
            '(' => open_parens.push(pos),
            ')' => {
                if open_parens.pop().is_none() {
                    errors.push(ParseError::at("Unmatched ')'", pos));
                }
            }
            _ => {}
        }
    }

    if let Some((q, pos)) = quote {
        let what = if q == '\'' { "string literal" } else { "quoted identifier" };
        errors.push(ParseError::at(format!("Unterminated {}", what), pos));
    }
    for pos in open_parens {
        errors.push(ParseError::at("Unmatched '('", pos));
    }
    errors
}

fn fail<T>(input: &str, kind: ErrorKind) -> IResult<&str, T> {
    Err(nom::Err::Error(Error::new(input, kind)))
}

fn check_depth(input: &str, depth: usize) -> Result<(), nom::Err<Error<&str>>> {
    if depth > MAX_EXPRESSION_DEPTH {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::TooLarge)));
    }
    Ok(())
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

/// Match `word` as a whole word, ignoring case
fn keyword<'a>(input: &'a str, word: &'static str) -> IResult<&'a str, &'a str> {
    let (rest, matched) = tag_no_case::<_, _, Error<_>>(word)(input)?;
    if rest.chars().next().is_some_and(is_ident_char) {
        return fail(input, ErrorKind::Tag);
    }
    Ok((rest, matched))
}

/// `NOT` followed by whitespace, if present
fn negation(input: &str) -> (&str, bool) {
    match keyword(input, "NOT") {
        Ok((rest, _)) => (rest.trim_start(), true),
        Err(_) => (input, false),
    }
}

/// OR has the lowest precedence
fn parse_or_expr(input: &str, depth: usize) -> IResult<&str, Expr> {
    check_depth(input, depth)?;
    let (mut input, mut left) = parse_and_expr(input, depth)?;
    let mut chain = depth;

    loop {
        let (rest, _) = multispace0(input)?;
        if let Ok((rest, _)) = keyword(rest, "OR") {
            chain += 1;
            let (rest, right) = parse_and_expr(rest, chain)?;
            left = Expr::binary(BinaryOp::Or, left, right);
            input = rest;
            continue;
        }
        return Ok((input, left));
    }
}

fn parse_and_expr(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (mut input, mut left) = parse_not_expr(input, depth)?;
    let mut chain = depth;

    loop {
        let (rest, _) = multispace0(input)?;
        if let Ok((rest, _)) = keyword(rest, "AND") {
            chain += 1;
            let (rest, right) = parse_not_expr(rest, chain)?;
            left = Expr::binary(BinaryOp::And, left, right);
            input = rest;
            continue;
        }
        return Ok((input, left));
    }
}

fn parse_not_expr(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, _) = multispace0(input)?;
    check_depth(input, depth)?;

    if let Ok((rest, _)) = keyword(input, "NOT") {
        let (rest, operand) = parse_not_expr(rest, depth + 1)?;
        return Ok((
            rest,
            Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
        ));
    }

    parse_predicate(input, depth)
}

/// Comparison or special predicate over additive operands
fn parse_predicate(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, left) = parse_additive_expr(input, depth)?;
    let (after_ws, _) = multispace0(input)?;

    // IS [NOT] NULL
    if let Ok((rest, _)) = keyword(after_ws, "IS") {
        let (rest, negated) = negation(rest.trim_start());
        let (rest, _) = keyword(rest.trim_start(), "NULL")?;
        return Ok((
            rest,
            Expr::IsNull {
                expr: Box::new(left),
                negated,
            },
        ));
    }

    // [NOT] IN / BETWEEN / LIKE
    let (op_input, negated) = negation(after_ws);

    if let Ok((rest, _)) = keyword(op_input, "IN") {
        let (rest, _) = multispace0(rest)?;
        let (rest, _) = char('(')(rest)?;
        let (rest, list) = separated_list1(
            delimited(multispace0, char(','), multispace0),
            |i| parse_or_expr(i, depth + 1),
        )
        .parse(rest)?;
        let (rest, _) = multispace0(rest)?;
        let (rest, _) = char(')')(rest)?;
        return Ok((
            rest,
            Expr::In {
                expr: Box::new(left),
                list,
                negated,
            },
        ));
    }

    if let Ok((rest, _)) = keyword(op_input, "BETWEEN") {
        let (rest, _) = multispace0(rest)?;
        let (rest, low) = parse_additive_expr(rest, depth + 1)?;
        let (rest, _) = multispace0(rest)?;
        let (rest, _) = keyword(rest, "AND")?;
        let (rest, _) = multispace0(rest)?;
        let (rest, high) = parse_additive_expr(rest, depth + 1)?;
        return Ok((
            rest,
            Expr::Between {
                expr: Box::new(left),
                low: Box::new(low),
                high: Box::new(high),
                negated,
            },
        ));
    }

    if let Ok((rest, _)) = keyword(op_input, "LIKE") {
        let (rest, _) = multispace0(rest)?;
        let (rest, pattern) = parse_additive_expr(rest, depth + 1)?;
        return Ok((
            rest,
            Expr::Like {
                expr: Box::new(left),
                pattern: Box::new(pattern),
                negated,
            },
        ));
    }

    if negated {
        // A dangling NOT is reported as trailing content by the caller
        return Ok((input, left));
    }

    // Comparison operators (two-character operators first)
    let op_opt = if let Ok((rest, _)) = tag::<_, _, Error<_>>("<=")(after_ws) {
        Some((rest, BinaryOp::LessOrEqual))
    } else if let Ok((rest, _)) = tag::<_, _, Error<_>>(">=")(after_ws) {
        Some((rest, BinaryOp::GreaterOrEqual))
    } else if let Ok((rest, _)) = tag::<_, _, Error<_>>("<>")(after_ws) {
        Some((rest, BinaryOp::NotEqual))
    } else if let Ok((rest, _)) = tag::<_, _, Error<_>>("!=")(after_ws) {
        Some((rest, BinaryOp::NotEqual))
    } else if let Ok((rest, _)) = tag::<_, _, Error<_>>("<")(after_ws) {
        Some((rest, BinaryOp::Less))
    } else if let Ok((rest, _)) = tag::<_, _, Error<_>>(">")(after_ws) {
        Some((rest, BinaryOp::Greater))
    } else if let Ok((rest, _)) = tag::<_, _, Error<_>>("=")(after_ws) {
        Some((rest, BinaryOp::Equal))
    } else {
        None
    };

    match op_opt {
        Some((rest, op)) => {
            let (rest, _) = multispace0(rest)?;
            let (rest, right) = parse_additive_expr(rest, depth + 1)?;
            Ok((rest, Expr::binary(op, left, right)))
        }
        None => Ok((input, left)),
    }
}

fn parse_additive_expr(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (mut input, mut left) = parse_multiplicative_expr(input, depth)?;
    let mut chain = depth;

    loop {
        let (rest, _) = multispace0(input)?;

        let op_and_input = if let Ok((rest, _)) = tag::<_, _, Error<_>>("||")(rest) {
            Some((rest, BinaryOp::Concat))
        } else if let Ok((rest, _)) = char::<_, Error<_>>('+')(rest) {
            Some((rest, BinaryOp::Add))
        } else if let Ok((rest, _)) = char::<_, Error<_>>('-')(rest) {
            Some((rest, BinaryOp::Subtract))
        } else {
            None
        };

        match op_and_input {
            Some((rest, op)) => {
                chain += 1;
                let (rest, right) = parse_multiplicative_expr(rest, chain)?;
                left = Expr::binary(op, left, right);
                input = rest;
            }
            None => return Ok((input, left)),
        }
    }
}

fn parse_multiplicative_expr(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (mut input, mut left) = parse_unary_expr(input, depth)?;
    let mut chain = depth;

    loop {
        let (rest, _) = multispace0(input)?;

        let op_and_input = if let Ok((rest, _)) = char::<_, Error<_>>('*')(rest) {
            Some((rest, BinaryOp::Multiply))
        } else if let Ok((rest, _)) = char::<_, Error<_>>('/')(rest) {
            Some((rest, BinaryOp::Divide))
        } else if let Ok((rest, _)) = char::<_, Error<_>>('%')(rest) {
            Some((rest, BinaryOp::Modulo))
        } else {
            None
        };

        match op_and_input {
            Some((rest, op)) => {
                chain += 1;
                let (rest, right) = parse_unary_expr(rest, chain)?;
                left = Expr::binary(op, left, right);
                input = rest;
            }
            None => return Ok((input, left)),
        }
    }
}

fn parse_unary_expr(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, _) = multispace0(input)?;
    check_depth(input, depth)?;

    if let Ok((rest, _)) = char::<_, Error<_>>('-')(input) {
        let (rest, operand) = parse_unary_expr(rest, depth + 1)?;
        let negated = match operand {
            Expr::Literal(Literal::Integer(i)) => Expr::Literal(Literal::Integer(-i)),
            Expr::Literal(Literal::Decimal(d)) => Expr::Literal(Literal::Decimal(format!("-{}", d))),
            other => Expr::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(other),
            },
        };
        return Ok((rest, negated));
    }

    parse_primary_expr(input, depth)
}

fn parse_primary_expr(input: &str, depth: usize) -> IResult<&str, Expr> {
    alt((
        |i| parse_parenthesized(i, depth),
        parse_string_literal,
        parse_number,
        parse_parameter,
        parse_keyword_literal,
        |i| parse_method_call(i, depth),
        parse_path,
    ))
    .parse(input)
}

fn parse_parenthesized(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, _) = char('(')(input)?;
    let (input, inner) = parse_or_expr(input, depth + 1)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char(')')(input)?;
    Ok((input, inner))
}

/// Body of a `q`-quoted token with doubled-quote escapes
fn parse_quoted(input: &str, q: char) -> IResult<&str, String> {
    let (mut rest, _) = char(q)(input)?;
    let mut value = String::new();
    loop {
        let Some(idx) = rest.find(q) else {
            return fail(input, ErrorKind::Char);
        };
        value.push_str(&rest[..idx]);
        rest = &rest[idx + q.len_utf8()..];
        match rest.strip_prefix(q) {
            Some(after) => {
                value.push(q);
                rest = after;
            }
            None => return Ok((rest, value)),
        }
    }
}

fn parse_string_literal(input: &str) -> IResult<&str, Expr> {
    let (rest, value) = parse_quoted(input, '\'')?;
    Ok((rest, Expr::Literal(Literal::String(value))))
}

fn parse_number(input: &str) -> IResult<&str, Expr> {
    let (rest, text) = recognize((digit1, opt(preceded(char('.'), digit1)))).parse(input)?;
    if rest.chars().next().is_some_and(is_ident_char) {
        return fail(input, ErrorKind::Digit);
    }
    let literal = if text.contains('.') {
        Literal::Decimal(text.to_string())
    } else {
        match text.parse::<i64>() {
            Ok(i) => Literal::Integer(i),
            Err(_) => Literal::Decimal(text.to_string()),
        }
    };
    Ok((rest, Expr::Literal(literal)))
}

fn parse_parameter(input: &str) -> IResult<&str, Expr> {
    let (rest, _) = char('$')(input)?;
    let (rest, name) = parse_identifier_str(rest)?;
    Ok((rest, Expr::Parameter(name.to_string())))
}

fn parse_keyword_literal(input: &str) -> IResult<&str, Expr> {
    if let Ok((rest, _)) = keyword(input, "TRUE") {
        return Ok((rest, Expr::Literal(Literal::Boolean(true))));
    }
    if let Ok((rest, _)) = keyword(input, "FALSE") {
        return Ok((rest, Expr::Literal(Literal::Boolean(false))));
    }
    let (rest, _) = keyword(input, "NULL")?;
    Ok((rest, Expr::Literal(Literal::Null)))
}

fn parse_method_call(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (rest, name) = parse_identifier_str(input)?;
    if is_keyword(name) {
        return fail(input, ErrorKind::Tag);
    }
    let (rest, _) = multispace0(rest)?;
    let (rest, _) = char('(')(rest)?;
    let (rest, args) = separated_list0(
        delimited(multispace0, char(','), multispace0),
        |i| parse_or_expr(i, depth + 1),
    )
    .parse(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, _) = char(')')(rest)?;
    Ok((
        rest,
        Expr::MethodCall {
            name: name.to_string(),
            args,
        },
    ))
}

fn parse_identifier_str(input: &str) -> IResult<&str, &str> {
    recognize((
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

fn parse_segment(input: &str) -> IResult<&str, String> {
    if input.starts_with('"') {
        return parse_quoted(input, '"');
    }
    let (rest, name) = parse_identifier_str(input)?;
    if is_keyword(name) {
        return fail(input, ErrorKind::Tag);
    }
    Ok((rest, name.to_string()))
}

/// `segment ( . segment )*`
fn parse_path(input: &str) -> IResult<&str, Expr> {
    let (mut rest, first) = parse_segment(input)?;
    let mut parts = vec![first];

    while let Ok((after_dot, _)) = char::<_, Error<_>>('.')(rest) {
        match parse_segment(after_dot) {
            Ok((after, part)) => {
                parts.push(part);
                rest = after;
            }
            Err(_) => break,
        }
    }

    match FieldKey::from_parts(parts) {
        Some(key) => Ok((rest, Expr::Identifier(key))),
        None => fail(input, ErrorKind::Alpha),
    }
}
