//! The modulate/demodulate binary wire codec.
//!
//! Values are encoded over the alphabet `{0, 1}`:
//!
//! - an integer `x` is a sign tag (`01` non-negative, `10` negative), a
//!   unary run of ones counting 4-bit groups terminated by a zero, and the
//!   zero-padded big-endian magnitude
//! - `nil` is `00`
//! - a pair is `11` followed by the encodings of head and tail
//!
//! `demodulate(modulate(v)) == v` holds exactly for every representable
//! value, including `0`. Decoding consumes a prefix and reports the
//! unconsumed suffix; at the top level a non-empty suffix is logged as a
//! warning, not treated as an error.

use log::warn;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;

use crate::ast::{self, NodeRef, Value};
use crate::combinators::Combinator;
use crate::evaluator::Evaluator;
use crate::Error;

/// Encode a value as a bit string, forcing as much of it as the encoding
/// needs. Fails with [`Error::UnmodulatableValue`] on anything that is
/// neither an integer nor a pair/nil structure.
pub fn modulate(ev: &Evaluator, node: &NodeRef) -> Result<String, Error> {
    let mut bits = String::new();
    modulate_into(ev, node, &mut bits)?;
    Ok(bits)
}

fn modulate_into(ev: &Evaluator, node: &NodeRef, out: &mut String) -> Result<(), Error> {
    match ev.force(node)? {
        Value::Number(n) => {
            modulate_number(&n, out);
            Ok(())
        }
        Value::Partial { op: Combinator::Nil, args } if args.is_empty() => {
            out.push_str("00");
            Ok(())
        }
        Value::Partial { op: Combinator::Cons, args } if args.len() == 2 => {
            out.push_str("11");
            modulate_into(ev, &args[0], out)?;
            modulate_into(ev, &args[1], out)
        }
        other => Err(Error::UnmodulatableValue(other.to_string())),
    }
}

fn modulate_number(n: &BigInt, out: &mut String) {
    out.push_str(if n.sign() == Sign::Minus { "10" } else { "01" });
    let magnitude = n.magnitude();
    let width = if magnitude.is_zero() {
        0
    } else {
        magnitude.bits() as usize
    };
    let groups = (width + 3) / 4;
    for _ in 0..groups {
        out.push('1');
    }
    out.push('0');
    if groups > 0 {
        let digits = magnitude.to_str_radix(2);
        for _ in 0..(groups * 4 - digits.len()) {
            out.push('0');
        }
        out.push_str(&digits);
    }
}

/// Decode a complete signal. A non-empty remainder is recoverable: it is
/// logged as a warning and the decoded prefix value is returned.
pub fn demodulate(bits: &str) -> Result<NodeRef, Error> {
    let (node, rest) = demodulate_prefix(bits)?;
    if !rest.is_empty() {
        warn!("{} extra bits after demodulation: {rest}", rest.len());
    }
    Ok(node)
}

/// Decode one value from the front of `bits`, returning the unconsumed
/// suffix.
pub fn demodulate_prefix(bits: &str) -> Result<(NodeRef, &str), Error> {
    let tag = bits.get(0..2).ok_or_else(|| {
        Error::MalformedEncoding("signal shorter than its type tag".to_string())
    })?;
    match tag {
        "01" => demodulate_number(&bits[2..], false),
        "10" => demodulate_number(&bits[2..], true),
        "00" => Ok((ast::nil(), &bits[2..])),
        "11" => {
            let (head, rest) = demodulate_prefix(&bits[2..])?;
            let (tail, rest) = demodulate_prefix(rest)?;
            Ok((ast::pair(head, tail), rest))
        }
        other => Err(Error::MalformedEncoding(format!(
            "unsupported type tag '{other}'"
        ))),
    }
}

fn demodulate_number(s: &str, negative: bool) -> Result<(NodeRef, &str), Error> {
    let prefix_end = s.find('0').ok_or_else(|| {
        Error::MalformedEncoding("unterminated group-count prefix".to_string())
    })?;
    let prefix = &s[..prefix_end];
    if !prefix.bytes().all(|b| b == b'1') {
        return Err(Error::MalformedEncoding(format!(
            "invalid group-count prefix '{prefix}'"
        )));
    }
    let width = prefix_end * 4;
    let digits_start = prefix_end + 1;
    let digits = s.get(digits_start..digits_start + width).ok_or_else(|| {
        Error::MalformedEncoding("truncated number payload".to_string())
    })?;
    let magnitude = if width == 0 {
        BigUint::zero()
    } else {
        BigUint::parse_bytes(digits.as_bytes(), 2).ok_or_else(|| {
            Error::MalformedEncoding(format!("invalid number payload '{digits}'"))
        })?
    };
    let mut value = BigInt::from(magnitude);
    if negative {
        value = -value;
    }
    Ok((ast::num(value), &s[digits_start + width..]))
}

/// Debugging aid: render a forced value as decimal integers, `nil` and
/// `(cons a b)` textual forms. Carries no round-trip guarantee.
pub fn format_readable(ev: &Evaluator, node: &NodeRef) -> Result<String, Error> {
    match ev.force(node)? {
        Value::Number(n) => Ok(n.to_string()),
        Value::Partial { op: Combinator::Nil, args } if args.is_empty() => {
            Ok("nil".to_string())
        }
        Value::Partial { op: Combinator::Cons, args } if args.len() == 2 => Ok(format!(
            "(cons {} {})",
            format_readable(ev, &args[0])?,
            format_readable(ev, &args[1])?
        )),
        other => Err(Error::UnmodulatableValue(other.to_string())),
    }
}
