//! nom combinators shared by the chemical formula, formula template, and rule equation grammars
use nom::{
    bytes::complete::take_while,
    character::complete::{digit1, multispace0, one_of, satisfy, space0},
    combinator::{map, map_res, opt, recognize},
    error::Error,
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
    IResult, Offset, Parser,
};

pub(crate) type ParseResult<'s, T> = IResult<&'s str, T>;

/// Surround `inner` with optional spaces or tabs
pub(crate) fn ws<'s, O, F>(inner: F) -> impl FnMut(&'s str) -> ParseResult<'s, O>
where
    F: Parser<&'s str, O, Error<&'s str>>,
{
    delimited(space0, inner, space0)
}

/// Sign = "+" | "-" ;
pub(crate) fn sign(i: &str) -> ParseResult<'_, i32> {
    map(one_of("+-"), |c| if c == '-' { -1 } else { 1 })(i)
}

/// Element = uppercase , { lowercase } ;
pub(crate) fn element_symbol(i: &str) -> ParseResult<'_, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_uppercase()),
        take_while(|c: char| c.is_ascii_lowercase()),
    ))(i)
}

/// Count = [ Sign ] , digit , { digit } ;
///
/// A sign without digits is not a count, which leaves it for an enclosing grammar to
/// read as an operator.
pub(crate) fn signed_count(i: &str) -> ParseResult<'_, i32> {
    map_res(recognize(pair(opt(one_of("+-")), digit1)), |s: &str| {
        s.parse::<i32>()
    })(i)
}

/// Atomic Offset = Element , [ Count ] ;
pub(crate) fn atomic_offset(i: &str) -> ParseResult<'_, (&str, i32)> {
    pair(element_symbol, opt(signed_count).map(|c| c.unwrap_or(1)))(i)
}

/// Chemical Formula = { [ whitespace ] , Atomic Offset } , [ whitespace ] ;
pub(crate) fn chemical_formula(i: &str) -> ParseResult<'_, Vec<(&str, i32)>> {
    terminated(many0(preceded(multispace0, atomic_offset)), multispace0)(i)
}

/// The byte offset into `text` where parsing stopped
pub(crate) fn error_offset(text: &str, err: &nom::Err<Error<&str>>) -> usize {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => text.offset(e.input),
        nom::Err::Incomplete(_) => text.len(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_element_symbol() {
        assert_eq!(element_symbol("H"), Ok(("", "H")));
        assert_eq!(element_symbol("Na"), Ok(("", "Na")));
        assert_eq!(element_symbol("OH"), Ok(("H", "O")));
        assert!(element_symbol("h").is_err());
        assert!(element_symbol("1H").is_err());
        assert!(element_symbol("$CHAIN").is_err());
    }

    #[test]
    fn test_signed_count() {
        assert_eq!(signed_count("12"), Ok(("", 12)));
        assert_eq!(signed_count("-1O"), Ok(("O", -1)));
        assert_eq!(signed_count("+3"), Ok(("", 3)));
        assert!(signed_count("-H2O").is_err());
        assert!(signed_count("99999999999").is_err());
    }

    #[test]
    fn test_atomic_offset() {
        assert_eq!(atomic_offset("C16H32"), Ok(("H32", ("C", 16))));
        assert_eq!(atomic_offset("P-H2O"), Ok(("-H2O", ("P", 1))));
        assert_eq!(atomic_offset("H-1"), Ok(("", ("H", -1))));
    }

    #[test]
    fn test_chemical_formula() {
        assert_eq!(
            chemical_formula(" C6 H12O6 "),
            Ok(("", vec![("C", 6), ("H", 12), ("O", 6)]))
        );
        assert_eq!(chemical_formula("C2(OH)"), Ok(("(OH)", vec![("C", 2)])));
        assert_eq!(chemical_formula(""), Ok(("", vec![])));
    }

    #[test]
    fn test_error_offset() {
        let text = "C2(OH)";
        let err = nom::combinator::all_consuming(chemical_formula)(text).unwrap_err();
        assert_eq!(error_offset(text, &err), 2);
    }
}
