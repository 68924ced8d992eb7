//! Module-source and expression parsing.
//!
//! The surface syntax is a flat token stream with no operator precedence:
//! `ap` is a binary prefix application operator consuming exactly the next
//! two parsed sub-expressions, integer tokens match `-?[0-9]+`, and any
//! other token is a symbol reference. A module is one `name = expression`
//! definition per line.

use std::fs;
use std::path::Path;

use log::debug;
use nom::{
    bytes::complete::take_till1, character::complete::multispace0, sequence::preceded, IResult,
    Parser,
};
use num_bigint::BigInt;

use crate::ast::{self, NodeRef};
use crate::evaluator::Environment;
use crate::{Error, ParseError, ParseErrorKind};

/// Next whitespace-delimited token.
fn token(input: &str) -> IResult<&str, &str> {
    preceded(multispace0, take_till1(|c: char| c.is_whitespace())).parse(input)
}

/// Integer tokens match `-?[0-9]+` in full; anything else is a symbol.
fn parse_integer(tok: &str) -> Option<BigInt> {
    let digits = tok.strip_prefix('-').unwrap_or(tok);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    BigInt::parse_bytes(tok.as_bytes(), 10)
}

fn parse_expr(input: &str) -> IResult<&str, NodeRef> {
    let (rest, tok) = token(input)?;
    if tok == "ap" {
        let (rest, fun) = parse_expr(rest)?;
        let (rest, arg) = parse_expr(rest)?;
        Ok((rest, ast::ap(fun, arg)))
    } else if let Some(n) = parse_integer(tok) {
        Ok((rest, ast::num(n)))
    } else {
        Ok((rest, ast::sym(tok)))
    }
}

fn to_parse_error(error: nom::Err<nom::error::Error<&str>>) -> Error {
    let kind_and_message = match &error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            if e.input.trim().is_empty() {
                (
                    ParseErrorKind::Incomplete,
                    "unexpected end of input, expression is incomplete".to_string(),
                )
            } else {
                (
                    ParseErrorKind::InvalidSyntax,
                    format!("invalid syntax near '{}'", e.input.trim()),
                )
            }
        }
        nom::Err::Incomplete(_) => (ParseErrorKind::Incomplete, "incomplete input".to_string()),
    };
    Error::ParseError(ParseError::new(kind_and_message.0, kind_and_message.1))
}

/// Parse a single expression, requiring the whole input be consumed.
pub fn parse_expression(input: &str) -> Result<NodeRef, Error> {
    let (rest, node) = parse_expr(input).map_err(to_parse_error)?;
    if !rest.trim().is_empty() {
        return Err(Error::ParseError(ParseError::new(
            ParseErrorKind::TrailingContent,
            format!("unexpected trailing content '{}'", rest.trim()),
        )));
    }
    Ok(node)
}

/// Parse one `name = expression` definition line.
pub fn parse_definition(line: &str) -> Result<(String, NodeRef), Error> {
    let (name, expr_src) = line.split_once('=').ok_or_else(|| {
        Error::ParseError(ParseError::new(
            ParseErrorKind::InvalidSyntax,
            "definition line is missing '='",
        ))
    })?;
    let name = name.trim();
    if name.is_empty() || name.split_whitespace().count() != 1 {
        return Err(Error::ParseError(ParseError::new(
            ParseErrorKind::InvalidSyntax,
            format!("definition name must be a single token, got '{name}'"),
        )));
    }
    let expr = parse_expression(expr_src)?;
    Ok((name.to_string(), expr))
}

/// Build an environment from module source: the global builtin bindings
/// plus one entry per definition line. Blank lines are skipped.
pub fn parse_module(source: &str) -> Result<Environment, Error> {
    let mut env = Environment::global();
    for (index, line) in source.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (name, expr) = parse_definition(line).map_err(|e| match e {
            Error::ParseError(p) => Error::ParseError(ParseError::new(
                p.kind,
                format!("line {}: {}", index + 1, p.message),
            )),
            other => other,
        })?;
        env.define(name, expr);
    }
    Ok(env)
}

/// Read a module file and build its environment.
pub fn load_module(path: &Path) -> Result<Environment, Error> {
    let source = fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
    let env = parse_module(&source)?;
    debug!("loaded {} bindings from {}", env.len(), path.display());
    Ok(env)
}
