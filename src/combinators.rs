//! Built-in combinator registry and reduction rules.
//!
//! The calculus ships a fixed library: SKI-style combinators (`s`, `c`,
//! `b`, `i`), the boolean selectors `t`/`f`, pair and list primitives
//! (`cons`, `car`, `cdr`, `nil`, `isnil`), integer arithmetic and
//! comparison, the codec entry points `mod`/`dem`, and the native
//! collaborator bindings `send`, `draw` and `multipledraw`.
//!
//! Every operation has a fixed arity. The evaluator accumulates argument
//! nodes on a [`Combinator`] until the arity is reached and then calls
//! [`reduce`], which returns a new graph to keep forcing. Arguments arrive
//! *unevaluated*; a rule forces only the operands its semantics need, which
//! is what lets `t`/`f` discard an argument without ever evaluating it.

use std::collections::HashMap;
use std::sync::LazyLock;

use num_integer::Integer;
use num_traits::Zero;

use crate::ast::{self, NodeRef, Value};
use crate::evaluator::Evaluator;
use crate::{modem, protocol, render, Error};

/// One operation of the fixed builtin library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// Select-first / constant: `t x y = x`
    T,
    /// Select-second: `f x y = y`
    F,
    /// Identity
    I,
    /// `s x y z = (x z) (y z)`
    S,
    /// `c x y z = (x z) y`
    C,
    /// `b x y z = x (y z)`
    B,
    /// Pair constructor as a function of a selector: `cons a b z = z a b`
    Cons,
    Car,
    Cdr,
    /// Constant function returning `t`; marks the list terminator
    Nil,
    IsNil,
    Eq,
    Lt,
    Neg,
    Inc,
    Dec,
    Add,
    Mul,
    /// Floor division
    Div,
    /// Modulate: value to bit string
    Mod,
    /// Demodulate: bit string to value
    Dem,
    /// Remote round-trip through the transport collaborator
    Send,
    /// Render a single point-list
    Draw,
    /// Render a list of point-lists
    MultipleDraw,
}

impl Combinator {
    /// Every operation, in registry order.
    pub const ALL: [Combinator; 24] = [
        Combinator::T,
        Combinator::F,
        Combinator::I,
        Combinator::S,
        Combinator::C,
        Combinator::B,
        Combinator::Cons,
        Combinator::Car,
        Combinator::Cdr,
        Combinator::Nil,
        Combinator::IsNil,
        Combinator::Eq,
        Combinator::Lt,
        Combinator::Neg,
        Combinator::Inc,
        Combinator::Dec,
        Combinator::Add,
        Combinator::Mul,
        Combinator::Div,
        Combinator::Mod,
        Combinator::Dem,
        Combinator::Send,
        Combinator::Draw,
        Combinator::MultipleDraw,
    ];

    /// The symbol this operation is bound to in the global environment.
    pub fn name(self) -> &'static str {
        match self {
            Combinator::T => "t",
            Combinator::F => "f",
            Combinator::I => "i",
            Combinator::S => "s",
            Combinator::C => "c",
            Combinator::B => "b",
            Combinator::Cons => "cons",
            Combinator::Car => "car",
            Combinator::Cdr => "cdr",
            Combinator::Nil => "nil",
            Combinator::IsNil => "isnil",
            Combinator::Eq => "eq",
            Combinator::Lt => "lt",
            Combinator::Neg => "neg",
            Combinator::Inc => "inc",
            Combinator::Dec => "dec",
            Combinator::Add => "add",
            Combinator::Mul => "mul",
            Combinator::Div => "div",
            Combinator::Mod => "mod",
            Combinator::Dem => "dem",
            Combinator::Send => "send",
            Combinator::Draw => "draw",
            Combinator::MultipleDraw => "multipledraw",
        }
    }

    /// Number of arguments the operation consumes before it reduces.
    pub fn arity(self) -> usize {
        match self {
            Combinator::I
            | Combinator::Car
            | Combinator::Cdr
            | Combinator::Nil
            | Combinator::IsNil
            | Combinator::Neg
            | Combinator::Inc
            | Combinator::Dec
            | Combinator::Mod
            | Combinator::Dem
            | Combinator::Send
            | Combinator::Draw
            | Combinator::MultipleDraw => 1,
            Combinator::T
            | Combinator::F
            | Combinator::Eq
            | Combinator::Lt
            | Combinator::Add
            | Combinator::Mul
            | Combinator::Div => 2,
            Combinator::S | Combinator::C | Combinator::B | Combinator::Cons => 3,
        }
    }
}

/// Map from environment symbol to operation (built once, on first use).
static BY_NAME: LazyLock<HashMap<&'static str, Combinator>> =
    LazyLock::new(|| Combinator::ALL.iter().map(|op| (op.name(), *op)).collect());

/// Look up a builtin operation by its environment symbol.
pub fn find_combinator(name: &str) -> Option<Combinator> {
    BY_NAME.get(name).copied()
}

/// Boolean selector as a node.
fn selector(b: bool) -> NodeRef {
    ast::op(if b { Combinator::T } else { Combinator::F })
}

/// Execute a fully applied operation, producing the graph to force next.
///
/// `args` holds exactly `op.arity()` unevaluated argument nodes.
pub(crate) fn reduce(op: Combinator, args: &[NodeRef], ev: &Evaluator) -> Result<NodeRef, Error> {
    debug_assert_eq!(args.len(), op.arity());
    match op {
        Combinator::T => Ok(args[0].clone()),
        Combinator::F => Ok(args[1].clone()),
        Combinator::I => Ok(args[0].clone()),
        Combinator::S => {
            // the z node is shared between both applications
            let (x, y, z) = (&args[0], &args[1], &args[2]);
            Ok(ast::ap(
                ast::ap(x.clone(), z.clone()),
                ast::ap(y.clone(), z.clone()),
            ))
        }
        Combinator::C => {
            let (x, y, z) = (&args[0], &args[1], &args[2]);
            Ok(ast::ap(ast::ap(x.clone(), z.clone()), y.clone()))
        }
        Combinator::B => {
            let (x, y, z) = (&args[0], &args[1], &args[2]);
            Ok(ast::ap(x.clone(), ast::ap(y.clone(), z.clone())))
        }
        Combinator::Cons => {
            let (a, b, z) = (&args[0], &args[1], &args[2]);
            Ok(ast::ap(ast::ap(z.clone(), a.clone()), b.clone()))
        }
        Combinator::Car => Ok(ast::ap(args[0].clone(), ast::op(Combinator::T))),
        Combinator::Cdr => Ok(ast::ap(args[0].clone(), ast::op(Combinator::F))),
        Combinator::Nil => Ok(ast::op(Combinator::T)),
        Combinator::IsNil => {
            // apply to the two-argument constant-f selector, `t (t f)`:
            // nil answers t, a pair feeds its elements in and answers f
            let discard_two = ast::ap(
                ast::op(Combinator::T),
                ast::ap(ast::op(Combinator::T), ast::op(Combinator::F)),
            );
            Ok(ast::ap(args[0].clone(), discard_two))
        }
        Combinator::Eq => {
            let a = ev.as_number(&args[0])?;
            let b = ev.as_number(&args[1])?;
            Ok(selector(a == b))
        }
        Combinator::Lt => {
            let a = ev.as_number(&args[0])?;
            let b = ev.as_number(&args[1])?;
            Ok(selector(a < b))
        }
        Combinator::Neg => Ok(ast::num(-ev.as_number(&args[0])?)),
        Combinator::Inc => Ok(ast::num(ev.as_number(&args[0])? + 1)),
        Combinator::Dec => Ok(ast::num(ev.as_number(&args[0])? - 1)),
        Combinator::Add => Ok(ast::num(ev.as_number(&args[0])? + ev.as_number(&args[1])?)),
        Combinator::Mul => Ok(ast::num(ev.as_number(&args[0])? * ev.as_number(&args[1])?)),
        Combinator::Div => {
            let a = ev.as_number(&args[0])?;
            let b = ev.as_number(&args[1])?;
            if b.is_zero() {
                return Err(Error::DivisionByZero);
            }
            Ok(ast::num(a.div_floor(&b)))
        }
        Combinator::Mod => {
            let bits = modem::modulate(ev, &args[0])?;
            Ok(ast::signal(bits))
        }
        Combinator::Dem => match ev.force(&args[0])? {
            Value::Signal(bits) => modem::demodulate(&bits),
            other => Err(Error::TypeError(format!(
                "dem expects a modulated signal, found {other}"
            ))),
        },
        Combinator::Send => protocol::send_value(ev, &args[0]),
        Combinator::Draw => {
            let picture = render::decode_picture(ev, &args[0])?;
            ev.draw_pictures(std::slice::from_ref(&picture))?;
            Ok(ast::op(Combinator::T))
        }
        Combinator::MultipleDraw => {
            let pictures = render::decode_pictures(ev, &args[0])?;
            ev.draw_pictures(&pictures)?;
            Ok(ast::op(Combinator::T))
        }
    }
}
