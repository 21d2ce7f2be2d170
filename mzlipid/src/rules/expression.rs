//! A nom grammar for intensity rule equations such as
//! `NL_FA[1] + 0.5 * NL_FA[2] > 2 * $BASEPEAK`

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alphanumeric0, char, digit1, satisfy},
    combinator::{all_consuming, consumed, map, map_res, opt, peek, recognize},
    multi::{many0, separated_list1},
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded, tuple},
    Offset,
};
use thiserror::Error;

use super::model::{Comparison, Expression, FragmentRef, Term};
use crate::parsers::{error_offset, sign, ws, ParseResult};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at column {column}")]
pub struct ExpressionError {
    pub message: String,
    pub column: usize,
}

impl ExpressionError {
    /// `offset` is a byte offset into `text`, reported as a one-based character column
    fn at(text: &str, offset: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            column: text[..offset].chars().count() + 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Factor<'s> {
    Number(f64),
    Variable(&'s str),
    Fragment(&'s str, Option<usize>),
}

/// A factor and the text it was read from
type Located<'s> = (&'s str, Factor<'s>);

/// Number = ( digit | "." ) , float ;
fn number(i: &str) -> ParseResult<'_, f64> {
    let leading = peek(satisfy(|c| c.is_ascii_digit() || c == '.'));
    map_res(preceded(leading, recognize_float), |s: &str| s.parse::<f64>())(i)
}

/// Identifier = ( letter | "_" ) , { letter | digit | "_" } ;
fn identifier(i: &str) -> ParseResult<'_, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(i)
}

/// Position = "[" , digit , { digit } , "]" ;
fn position(i: &str) -> ParseResult<'_, usize> {
    delimited(
        char('['),
        map_res(digit1, |s: &str| s.parse::<usize>()),
        char(']'),
    )(i)
}

/// Factor = Number | "$" , { letter | digit } | Identifier , [ Position ] ;
fn factor(i: &str) -> ParseResult<'_, Factor<'_>> {
    alt((
        map(number, Factor::Number),
        map(preceded(char('$'), alphanumeric0), Factor::Variable),
        map(pair(identifier, opt(position)), |(name, position)| {
            Factor::Fragment(name, position)
        }),
    ))(i)
}

/// Term = Factor , { "*" , Factor } ;
fn term(i: &str) -> ParseResult<'_, Vec<Located<'_>>> {
    separated_list1(char('*'), ws(consumed(factor)))(i)
}

/// Side = [ Sign ] , Term , { Sign , Term } ;
fn side(i: &str) -> ParseResult<'_, Vec<(i32, Vec<Located<'_>>)>> {
    let (i, first_sign) = opt(ws(sign))(i)?;
    let (i, first) = term(i)?;
    let (i, rest) = many0(pair(ws(sign), term))(i)?;
    let mut terms = vec![(first_sign.unwrap_or(1), first)];
    terms.extend(rest);
    Ok((i, terms))
}

/// Comparison = ">=" | "<=" | ">" | "<" ;
fn comparison(i: &str) -> ParseResult<'_, Comparison> {
    alt((
        map(tag(">="), |_| Comparison::GreaterEqual),
        map(tag("<="), |_| Comparison::LessEqual),
        map(char('>'), |_| Comparison::Greater),
        map(char('<'), |_| Comparison::Less),
    ))(i)
}

/// Fold the factors of one term into a coefficient and its single fragment reference
fn resolve_term(text: &str, sign: i32, factors: Vec<Located<'_>>) -> Result<Term, ExpressionError> {
    let mut factor = sign as f64;
    let mut reference = None;
    let mut end = 0;
    for (source, part) in factors {
        let offset = text.offset(source);
        end = offset + source.len();
        let next = match part {
            Factor::Number(x) => {
                factor *= x;
                continue;
            }
            Factor::Variable("BASEPEAK") => FragmentRef::BasePeak,
            Factor::Variable(other) => {
                return Err(ExpressionError::at(text, offset, format!("Unknown variable ${other}")));
            }
            Factor::Fragment(name, position) => FragmentRef::Fragment {
                name: name.to_string(),
                position,
            },
        };
        if reference.replace(next).is_some() {
            return Err(ExpressionError::at(
                text,
                offset,
                "A term may refer to only one fragment",
            ));
        }
    }
    match reference {
        Some(reference) => Ok(Term { factor, reference }),
        None => Err(ExpressionError::at(text, end, "A term must refer to a fragment")),
    }
}

fn resolve_side(text: &str, side: Vec<(i32, Vec<Located<'_>>)>) -> Result<Vec<Term>, ExpressionError> {
    side.into_iter()
        .map(|(sign, factors)| resolve_term(text, sign, factors))
        .collect()
}

pub fn parse_expression(text: &str) -> Result<Expression, ExpressionError> {
    let (_, (lhs, op, rhs)) = all_consuming(tuple((side, ws(comparison), side)))(text)
        .map_err(|e| {
            let offset = error_offset(text, &e);
            let message = match text[offset..].chars().next() {
                Some(c) => format!("Unexpected character {c:?}"),
                None => "Unexpected end of equation".to_string(),
            };
            ExpressionError::at(text, offset, message)
        })?;
    Ok(Expression {
        lhs: resolve_side(text, lhs)?,
        op,
        rhs: resolve_side(text, rhs)?,
    })
}
