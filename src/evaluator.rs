//! Lazy, memoizing evaluation core.
//!
//! [`force`](Evaluator::force) reduces a graph node to a fully-forced
//! [`Value`], deterministically for a given environment. Applications pass
//! their argument nodes unevaluated and cache the forced result in the
//! node itself, exactly once; later forcings of the same node return the
//! cached value without recomputation.
//!
//! The [`Evaluator`] owns the environment and the two external
//! collaborators (transport and renderer) behind traits, so independent
//! instances can be built in tests with mock collaborators and no shared
//! global state.

use std::cell::RefCell;
use std::collections::HashMap;

use log::trace;
use num_bigint::BigInt;
use num_traits::Zero;

use crate::ast::{self, Node, NodeRef, Value};
use crate::combinators::{self, Combinator};
use crate::protocol::{Transport, UnconfiguredTransport};
use crate::render::{NullRenderer, Picture, Renderer};
use crate::Error;

/// Mapping from symbol name to its definition node.
///
/// Built once at startup (global combinator bindings plus one entry per
/// module definition) and read-only for the rest of the process.
#[derive(Debug, Default)]
pub struct Environment {
    bindings: HashMap<String, NodeRef>,
}

impl Environment {
    /// Empty environment, without even the builtin bindings.
    pub fn new() -> Self {
        Environment {
            bindings: HashMap::new(),
        }
    }

    /// Environment holding the full builtin library under its symbol names,
    /// including the native `send`/`draw`/`multipledraw` bindings.
    pub fn global() -> Self {
        let mut env = Environment::new();
        for op in Combinator::ALL {
            env.define(op.name(), ast::op(op));
        }
        env
    }

    pub fn define(&mut self, name: impl Into<String>, node: NodeRef) {
        self.bindings.insert(name.into(), node);
    }

    pub fn get(&self, name: &str) -> Option<&NodeRef> {
        self.bindings.get(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// The graph-reduction engine plus its collaborators.
pub struct Evaluator {
    env: Environment,
    transport: Box<dyn Transport>,
    renderer: RefCell<Box<dyn Renderer>>,
}

impl Evaluator {
    /// Evaluator over `env` with inert collaborators: the transport
    /// reports a configuration error when first used and the renderer
    /// discards pictures.
    pub fn new(env: Environment) -> Self {
        Evaluator {
            env,
            transport: Box::new(UnconfiguredTransport),
            renderer: RefCell::new(Box::new(NullRenderer)),
        }
    }

    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = RefCell::new(renderer);
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Reduce a node to a fully-forced value.
    ///
    /// Symbols resolve through the environment and fail with
    /// [`Error::UnboundSymbol`] when absent. An application with a
    /// populated cache returns the cached value unchanged; otherwise the
    /// function position is forced to a callable, applied to the
    /// unevaluated argument node, and the forced result is written to the
    /// cache exactly once.
    pub fn force(&self, node: &NodeRef) -> Result<Value, Error> {
        match node.as_ref() {
            Node::Number(n) => Ok(Value::Number(n.clone())),
            Node::Signal(bits) => Ok(Value::Signal(bits.clone())),
            Node::Builtin { op, args } => Ok(Value::Partial {
                op: *op,
                args: args.clone(),
            }),
            Node::Symbol(name) => {
                trace!("resolving {name}");
                let def = self
                    .env
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::UnboundSymbol(name.clone()))?;
                self.force(&def)
            }
            Node::Apply { fun, arg, cache } => {
                if let Some(value) = cache.get() {
                    return Ok(value.clone());
                }
                let fun_value = self.force(fun)?;
                let next = self.apply(fun_value, arg.clone())?;
                let value = self.force(&next)?;
                // first writer wins; the cell is never reassigned
                let _ = cache.set(value.clone());
                Ok(value)
            }
        }
    }

    /// Apply a forced callable to an unevaluated argument node, producing
    /// the graph to force next.
    fn apply(&self, fun: Value, arg: NodeRef) -> Result<NodeRef, Error> {
        match fun {
            Value::Partial { op, mut args } => {
                args.push(arg);
                if args.len() < op.arity() {
                    Ok(Value::Partial { op, args }.into_node())
                } else {
                    combinators::reduce(op, &args, self)
                }
            }
            other => Err(Error::NotCallable(other.to_string())),
        }
    }

    /// Force a node all the way to an integer.
    pub fn as_number(&self, node: &NodeRef) -> Result<BigInt, Error> {
        match self.force(node)? {
            Value::Number(n) => Ok(n),
            other => Err(Error::TypeError(format!(
                "expected an integer, found {other}"
            ))),
        }
    }

    /// Force a node to a `cons` pair and return its head and tail nodes.
    pub fn as_pair(&self, node: &NodeRef) -> Result<(NodeRef, NodeRef), Error> {
        match self.force(node)? {
            Value::Partial { op: Combinator::Cons, args } if args.len() == 2 => {
                Ok((args[0].clone(), args[1].clone()))
            }
            other => Err(Error::TypeError(format!("expected a pair, found {other}"))),
        }
    }

    /// Walk a right-nested `cons`/`nil` list into a vector of element nodes.
    pub fn to_vec(&self, node: &NodeRef) -> Result<Vec<NodeRef>, Error> {
        let mut items = Vec::new();
        let mut current = node.clone();
        loop {
            match self.force(&current)? {
                Value::Partial { op: Combinator::Nil, args } if args.is_empty() => {
                    return Ok(items)
                }
                Value::Partial { op: Combinator::Cons, args } if args.len() == 2 => {
                    items.push(args[0].clone());
                    current = args[1].clone();
                }
                other => {
                    return Err(Error::TypeError(format!("expected a list, found {other}")))
                }
            }
        }
    }

    /// Convert a boolean selector to a Rust bool by applying it to `(1, 0)`
    /// and forcing the result.
    pub fn truthy(&self, node: &NodeRef) -> Result<bool, Error> {
        let picked = ast::ap(ast::ap(node.clone(), ast::num(1)), ast::num(0));
        Ok(!self.as_number(&picked)?.is_zero())
    }

    pub(crate) fn transport_send(&self, signal: &str) -> Result<String, Error> {
        self.transport.send(signal)
    }

    pub(crate) fn draw_pictures(&self, pictures: &[Picture]) -> Result<(), Error> {
        self.renderer.borrow_mut().draw(pictures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;
    use std::rc::Rc;

    fn evaluator() -> Evaluator {
        Evaluator::new(Environment::global())
    }

    fn eval_number(source: &str) -> BigInt {
        let ev = evaluator();
        ev.as_number(&parse_expression(source).unwrap()).unwrap()
    }

    fn eval_bool(source: &str) -> bool {
        let ev = evaluator();
        ev.truthy(&parse_expression(source).unwrap()).unwrap()
    }

    /// Transport that counts invocations and always answers nil.
    struct CountingTransport {
        calls: Rc<RefCell<usize>>,
    }

    impl Transport for CountingTransport {
        fn send(&self, _signal: &str) -> Result<String, Error> {
            *self.calls.borrow_mut() += 1;
            Ok("00".to_string())
        }
    }

    #[test]
    fn test_number_forces_to_itself() {
        assert_eq!(eval_number("42"), BigInt::from(42));
        assert_eq!(eval_number("-13"), BigInt::from(-13));
    }

    #[test]
    fn test_symbol_resolves_through_environment() {
        let mut env = Environment::global();
        env.define("answer", ast::num(42));
        env.define("alias", ast::sym("answer"));
        let ev = Evaluator::new(env);
        assert_eq!(
            ev.as_number(&parse_expression("alias").unwrap()).unwrap(),
            BigInt::from(42)
        );
    }

    #[test]
    fn test_unbound_symbol_is_an_error() {
        let ev = evaluator();
        let err = ev.force(&ast::sym("galaxy")).unwrap_err();
        assert_eq!(err, Error::UnboundSymbol("galaxy".to_string()));
    }

    #[test]
    fn test_applying_a_number_fails() {
        let ev = evaluator();
        let err = ev.force(&parse_expression("ap 1 2").unwrap()).unwrap_err();
        assert!(matches!(err, Error::NotCallable(_)));
    }

    #[test]
    fn test_laziness_discards_unused_argument() {
        // the second argument of t would fail if forced: car of a number
        assert_eq!(eval_number("ap ap t 42 ap car 1"), BigInt::from(42));
        assert_eq!(eval_number("ap ap f ap car 1 7"), BigInt::from(7));
    }

    #[test]
    fn test_memoization_computes_shared_node_once() {
        let calls = Rc::new(RefCell::new(0));
        let ev = Evaluator::new(Environment::global()).with_transport(Box::new(
            CountingTransport {
                calls: calls.clone(),
            },
        ));

        // the transport is reachable only through this one application node
        let shared = ast::ap(ast::op(Combinator::Send), ast::nil());
        ev.force(&shared).unwrap();
        ev.force(&shared).unwrap();
        assert_eq!(*calls.borrow(), 1);

        // a structurally equal but distinct node is reduced independently
        let fresh = ast::ap(ast::op(Combinator::Send), ast::nil());
        ev.force(&fresh).unwrap();
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn test_ski_identity() {
        // s t t x = (t x) (t x) = x
        assert_eq!(eval_number("ap ap ap s t t 42"), BigInt::from(42));
        assert_eq!(eval_number("ap i -7"), BigInt::from(-7));
    }

    #[test]
    fn test_c_and_b_combinators() {
        // c add 1 2 = add 2 1
        assert_eq!(eval_number("ap ap ap c add 1 2"), BigInt::from(3));
        // b neg neg 5 = neg (neg 5)
        assert_eq!(eval_number("ap ap ap b neg neg 5"), BigInt::from(5));
    }

    #[test]
    fn test_pair_laws() {
        assert_eq!(eval_number("ap car ap ap cons 7 nil"), BigInt::from(7));
        assert_eq!(
            eval_number("ap cdr ap ap cons 7 ap ap cons 8 nil"),
            BigInt::from(8)
        );
        // cons a b z = z a b
        assert_eq!(eval_number("ap ap ap cons 1 2 add"), BigInt::from(3));
    }

    #[test]
    fn test_isnil() {
        assert!(eval_bool("ap isnil nil"));
        assert!(!eval_bool("ap isnil ap ap cons 1 nil"));
    }

    #[test]
    fn test_comparisons() {
        assert!(eval_bool("ap ap eq 3 3"));
        assert!(!eval_bool("ap ap eq 3 4"));
        assert!(eval_bool("ap ap lt 2 3"));
        assert!(!eval_bool("ap ap lt 3 2"));
        assert!(!eval_bool("ap ap lt 3 3"));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval_number("ap ap add 2 3"), BigInt::from(5));
        assert_eq!(eval_number("ap ap mul -4 3"), BigInt::from(-12));
        assert_eq!(eval_number("ap neg 5"), BigInt::from(-5));
        assert_eq!(eval_number("ap inc 41"), BigInt::from(42));
        assert_eq!(eval_number("ap dec 0"), BigInt::from(-1));
    }

    #[test]
    fn test_arithmetic_is_arbitrary_precision() {
        let big = eval_number("ap ap mul 123456789123456789 1000000000000000000");
        assert_eq!(
            big,
            "123456789123456789000000000000000000".parse::<BigInt>().unwrap()
        );
    }

    #[test]
    fn test_div_floors_toward_negative_infinity() {
        assert_eq!(eval_number("ap ap div -7 2"), BigInt::from(-4));
        assert_eq!(eval_number("ap ap div 7 2"), BigInt::from(3));
        assert_eq!(eval_number("ap ap div -1 3"), BigInt::from(-1));
        assert_eq!(eval_number("ap ap div 6 -3"), BigInt::from(-2));
    }

    #[test]
    fn test_division_by_zero() {
        let ev = evaluator();
        let err = ev
            .as_number(&parse_expression("ap ap div 1 0").unwrap())
            .unwrap_err();
        assert_eq!(err, Error::DivisionByZero);
    }

    #[test]
    fn test_to_vec_walks_cons_lists() {
        let ev = evaluator();
        let node = parse_expression("ap ap cons 1 ap ap cons 2 ap ap cons 3 nil").unwrap();
        let items = ev.to_vec(&node).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(ev.as_number(&items[2]).unwrap(), BigInt::from(3));

        let err = ev.to_vec(&ast::num(5)).unwrap_err();
        assert!(matches!(err, Error::TypeError(_)));
    }

    #[test]
    fn test_under_application_yields_a_callable() {
        let ev = evaluator();
        let value = ev.force(&parse_expression("ap add 1").unwrap()).unwrap();
        assert!(matches!(
            value,
            Value::Partial { op: Combinator::Add, ref args } if args.len() == 1
        ));
    }
}
