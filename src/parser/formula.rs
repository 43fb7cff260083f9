// Formula parser: arithmetic over column references

use super::ast::{BinaryOp, Expr};
use super::lexer::{bracketed_name, identifier, number_literal, ws};
use nom::{
    branch::alt,
    character::complete::char,
    combinator::{eof, map, value},
    multi::fold_many0,
    sequence::{delimited, pair, preceded},
    IResult,
};

/// Parse a complete formula, requiring all input to be consumed
/// Format: expr := term (('+' | '-') term)*
///         term := factor (('*' | '/') factor)*
///         factor := '-' factor | '(' expr ')' | [name] | name | number
pub fn parse_formula(input: &str) -> IResult<&str, Expr> {
    let (input, expr) = parse_expr(input)?;
    let (input, _) = ws(eof)(input)?;
    Ok((input, expr))
}

fn parse_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_term(input)?;
    fold_many0(
        pair(ws(additive_op), parse_term),
        move || first.clone(),
        |acc, (op, rhs)| Expr::binary(op, acc, rhs),
    )(input)
}

fn parse_term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_factor(input)?;
    fold_many0(
        pair(ws(multiplicative_op), parse_factor),
        move || first.clone(),
        |acc, (op, rhs)| Expr::binary(op, acc, rhs),
    )(input)
}

fn parse_factor(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        map(preceded(ws(minus), parse_factor), |e| Expr::Neg(Box::new(e))),
        delimited(ws(char('(')), parse_expr, ws(char(')'))),
        map(bracketed_name, Expr::Column),
        map(identifier, Expr::Column),
        map(number_literal, Expr::Number),
    )))(input)
}

fn minus(input: &str) -> IResult<&str, char> {
    alt((char('-'), char('−')))(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Add, char('+')),
        value(BinaryOp::Sub, minus),
    ))(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Mul, alt((char('*'), char('×')))),
        value(BinaryOp::Div, alt((char('/'), char('÷')))),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> Expr {
        Expr::Column(name.to_string())
    }

    fn parse(input: &str) -> Expr {
        parse_formula(input).unwrap().1
    }

    #[test]
    fn test_parse_single_column() {
        assert_eq!(parse("[Sales]"), col("Sales"));
        assert_eq!(parse("  Sales  "), col("Sales"));
    }

    #[test]
    fn test_parse_precedence() {
        assert_eq!(
            parse("[a] + [b] * 2"),
            Expr::binary(
                BinaryOp::Add,
                col("a"),
                Expr::binary(BinaryOp::Mul, col("b"), Expr::Number(2.0))
            )
        );
    }

    #[test]
    fn test_parse_left_associative() {
        assert_eq!(
            parse("a - b - c"),
            Expr::binary(
                BinaryOp::Sub,
                Expr::binary(BinaryOp::Sub, col("a"), col("b")),
                col("c")
            )
        );
    }

    #[test]
    fn test_parse_parentheses_and_unary() {
        assert_eq!(
            parse("-([a] + 1) / 4"),
            Expr::binary(
                BinaryOp::Div,
                Expr::Neg(Box::new(Expr::binary(BinaryOp::Add, col("a"), Expr::Number(1.0)))),
                Expr::Number(4.0)
            )
        );
    }

    #[test]
    fn test_parse_typographic_operators() {
        assert_eq!(parse("a × b"), parse("a * b"));
        assert_eq!(parse("a ÷ b"), parse("a / b"));
        assert_eq!(parse("a − b"), parse("a - b"));
    }

    #[test]
    fn test_parse_bracketed_names_with_spaces() {
        assert_eq!(
            parse("[Unit Price]*[Qty Sold]"),
            Expr::binary(BinaryOp::Mul, col("Unit Price"), col("Qty Sold"))
        );
    }

    #[test]
    fn test_parse_rejects_trailing_input() {
        assert!(parse_formula("a b").is_err());
        assert!(parse_formula("a +").is_err());
        assert!(parse_formula("(a").is_err());
        assert!(parse_formula("").is_err());
    }

    #[test]
    fn test_columns_listed_in_order() {
        let e = parse("[b] * a + [b]");
        assert_eq!(e.columns(), vec!["b", "a", "b"]);
    }
}
