// Lexical helpers shared by the formula grammar

use nom::{
    bytes::complete::take_while,
    character::complete::{char, multispace0, satisfy},
    combinator::{map_res, recognize},
    error::{Error, ErrorKind},
    number::complete::recognize_float,
    sequence::{delimited, pair},
    IResult,
};

/// Wrap a parser so it skips surrounding whitespace
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Bare column name: a letter or underscore, then letters, digits or underscores
pub fn identifier(input: &str) -> IResult<&str, String> {
    let (input, name) = recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)?;
    Ok((input, name.to_string()))
}

/// Column name in square brackets; `]]` stands for a literal `]`
/// Format: [Unit Price] or [Margin [%]]]
pub fn bracketed_name(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = char('[')(input)?;
    let mut name = String::new();

    loop {
        let Some(pos) = rest.find(']') else {
            return Err(nom::Err::Error(Error::new(rest, ErrorKind::Char)));
        };
        name.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match after.strip_prefix(']') {
            Some(stripped) => {
                name.push(']');
                rest = stripped;
            }
            None => return Ok((after, name)),
        }
    }
}

/// Escape a column name for use inside brackets
pub fn bracket(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Unsigned decimal or scientific literal
pub fn number_literal(input: &str) -> IResult<&str, f64> {
    map_res(recognize_float, |s: &str| s.parse::<f64>())(input)
}
