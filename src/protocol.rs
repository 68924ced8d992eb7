//! Remote transport and the recursive interaction driver.
//!
//! A protocol program is a two-argument callable:
//! `protocol(state)(vector)` forces to a three-element list
//! `[flag, newState, data]`. A `flag` of `0` means render `data` and
//! finish the round with `newState`; any other value means send `data` to
//! the remote endpoint and run the protocol again on the response. The
//! meaning of `flag` is a convention of the protocol programs this driver
//! interprets, not a rule of the calculus itself.

use std::io::{self, BufRead};

use log::{debug, info, warn};
use num_traits::Zero;

use crate::ast::{self, NodeRef};
use crate::evaluator::Evaluator;
use crate::{modem, render, Error};

/// Delivery of modulated signals to the remote endpoint.
pub trait Transport {
    /// Deliver a signal, returning the modulated response body.
    fn send(&self, signal: &str) -> Result<String, Error>;
}

/// Default transport: reports the missing configuration on first use,
/// before any network attempt could be made.
pub struct UnconfiguredTransport;

impl Transport for UnconfiguredTransport {
    fn send(&self, _signal: &str) -> Result<String, Error> {
        Err(Error::ConfigurationError(
            "no transport endpoint configured".to_string(),
        ))
    }
}

/// Blocking HTTP transport. The request body is the bit string rendered
/// as ASCII `0`/`1` characters; the credential rides on the request
/// target. No request timeout is configured.
pub struct HttpTransport {
    agent: ureq::Agent,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        HttpTransport {
            agent: ureq::agent(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, signal: &str) -> Result<String, Error> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            Error::ConfigurationError(
                "a player key is required to talk to the remote endpoint".to_string(),
            )
        })?;
        let url = format!("{}/aliens/send?apiKey={key}", self.base_url);
        debug!("request signal {signal}");
        match self.agent.post(&url).send_string(signal) {
            Ok(response) => {
                let body = response.into_string().map_err(|e| Error::TransportFailure {
                    status: 0,
                    body: e.to_string(),
                })?;
                let body = body.trim().to_string();
                debug!("response signal {body}");
                Ok(body)
            }
            Err(ureq::Error::Status(status, response)) => Err(Error::TransportFailure {
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(e)) => Err(Error::TransportFailure {
                status: 0,
                body: e.to_string(),
            }),
        }
    }
}

/// Remote round-trip: modulate, deliver, demodulate. Shared by the
/// driver's continue branch and the language-level `send` binding.
pub(crate) fn send_value(ev: &Evaluator, value: &NodeRef) -> Result<NodeRef, Error> {
    let signal = modem::modulate(ev, value)?;
    let response = ev.transport_send(&signal)?;
    modem::demodulate(&response)
}

/// Run one protocol round.
///
/// Recursion depth equals the number of consecutive remote round-trips
/// the protocol demands before it is ready to render; there is no
/// artificial bound.
pub fn interact(
    ev: &Evaluator,
    protocol: &NodeRef,
    state: NodeRef,
    vector: NodeRef,
) -> Result<NodeRef, Error> {
    let result = ast::ap(ast::ap(protocol.clone(), state), vector);
    let items = ev.to_vec(&result)?;
    let [flag, new_state, data] = items.as_slice() else {
        return Err(Error::TypeError(format!(
            "protocol produced a list of {} elements, expected 3",
            items.len()
        )));
    };
    if ev.as_number(flag)?.is_zero() {
        let pictures = render::decode_pictures(ev, data)?;
        ev.draw_pictures(&pictures)?;
        Ok(new_state.clone())
    } else {
        let response = send_value(ev, data)?;
        interact(ev, protocol, new_state.clone(), response)
    }
}

/// State seed for the first round of a fresh session.
pub fn initial_state() -> NodeRef {
    ast::list(vec![
        ast::num(1),
        ast::list(vec![ast::num(11)]),
        ast::num(0),
        ast::nil(),
    ])
}

/// One discrete input event, in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Click(i64, i64),
    Quit,
}

/// Blocking source of input events.
pub trait InputSource {
    fn next_event(&mut self) -> Result<Event, Error>;
}

/// Reads clicks from stdin, one `x y` pair of window coordinates per
/// line; `q` or end of input is the termination signal. Window
/// coordinates are mapped onto the canvas through the 4x display scale.
pub struct StdinInput;

impl InputSource for StdinInput {
    fn next_event(&mut self) -> Result<Event, Error> {
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            let read = stdin
                .lock()
                .read_line(&mut line)
                .map_err(|e| Error::Io(e.to_string()))?;
            if read == 0 {
                return Ok(Event::Quit);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed == "q" || trimmed == "quit" {
                return Ok(Event::Quit);
            }
            let mut parts = trimmed.split_whitespace();
            let coords = (
                parts.next().and_then(|t| t.parse::<i64>().ok()),
                parts.next().and_then(|t| t.parse::<i64>().ok()),
                parts.next(),
            );
            match coords {
                (Some(x), Some(y), None) => {
                    let ax = x / 4 - i64::from(render::WIDTH / 2);
                    let ay = y / 4 - i64::from(render::HEIGHT / 2);
                    info!("click {x} {y} -> {ax} {ay}");
                    return Ok(Event::Click(ax, ay));
                }
                _ => warn!("expected 'x y' or 'q', got '{trimmed}'"),
            }
        }
    }
}

/// Drive protocol rounds until the input source signals termination.
pub fn interact_loop(
    ev: &Evaluator,
    protocol: &NodeRef,
    input: &mut dyn InputSource,
) -> Result<(), Error> {
    let mut state = initial_state();
    loop {
        match input.next_event()? {
            Event::Quit => return Ok(()),
            Event::Click(x, y) => {
                let vector = ast::pair(ast::num(x), ast::num(y));
                info!("running");
                state = interact(ev, protocol, state, vector)?;
                info!("finished");
                match modem::format_readable(ev, &state) {
                    Ok(text) => info!("state {text}"),
                    Err(_) => debug!("state is not list-shaped"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Environment;
    use crate::parser::parse_expression;
    use crate::render::{Picture, Renderer};
    use num_bigint::BigInt;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    struct RecordingRenderer {
        frames: Rc<RefCell<Vec<Vec<Picture>>>>,
    }

    impl Renderer for RecordingRenderer {
        fn draw(&mut self, pictures: &[Picture]) -> Result<(), Error> {
            self.frames.borrow_mut().push(pictures.to_vec());
            Ok(())
        }
    }

    struct ScriptedTransport {
        calls: Rc<RefCell<Vec<String>>>,
        responses: RefCell<VecDeque<String>>,
    }

    impl Transport for ScriptedTransport {
        fn send(&self, signal: &str) -> Result<String, Error> {
            self.calls.borrow_mut().push(signal.to_string());
            Ok(self
                .responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| "00".to_string()))
        }
    }

    struct ScriptedInput {
        events: VecDeque<Event>,
    }

    impl InputSource for ScriptedInput {
        fn next_event(&mut self) -> Result<Event, Error> {
            Ok(self.events.pop_front().unwrap_or(Event::Quit))
        }
    }

    fn harness() -> (Evaluator, Rc<RefCell<Vec<String>>>, Rc<RefCell<Vec<Vec<Picture>>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let frames = Rc::new(RefCell::new(Vec::new()));
        let ev = Evaluator::new(Environment::global())
            .with_transport(Box::new(ScriptedTransport {
                calls: calls.clone(),
                responses: RefCell::new(VecDeque::new()),
            }))
            .with_renderer(Box::new(RecordingRenderer {
                frames: frames.clone(),
            }));
        (ev, calls, frames)
    }

    // protocol ignoring state and vector: always [0, nil, nil]
    fn render_only_protocol() -> NodeRef {
        parse_expression("ap t ap t ap ap cons 0 ap ap cons nil ap ap cons nil nil").unwrap()
    }

    // protocol whose flag is the incoming state: [state, 0, nil]
    fn send_once_protocol() -> NodeRef {
        parse_expression("ap ap b t ap ap c cons ap ap cons 0 ap ap cons nil nil").unwrap()
    }

    #[test]
    fn test_interact_with_flag_zero_renders_and_stops() {
        let (ev, calls, frames) = harness();
        let result = interact(&ev, &render_only_protocol(), ast::num(1), ast::nil()).unwrap();
        assert_eq!(calls.borrow().len(), 0);
        assert_eq!(frames.borrow().len(), 1);
        assert_eq!(frames.borrow()[0], Vec::<Picture>::new());
        assert!(ev.truthy(&ast::ap(ast::op(crate::combinators::Combinator::IsNil), result))
            .unwrap());
    }

    #[test]
    fn test_interact_with_flag_one_sends_once_then_recurses() {
        let (ev, calls, frames) = harness();
        // first round: flag 1 sends nil; second round runs on state 0
        let result = interact(&ev, &send_once_protocol(), ast::num(1), ast::nil()).unwrap();
        assert_eq!(*calls.borrow(), vec!["00".to_string()]);
        assert_eq!(frames.borrow().len(), 1);
        assert_eq!(ev.as_number(&result).unwrap(), BigInt::from(0));
    }

    #[test]
    fn test_interact_rejects_short_protocol_results() {
        let (ev, _, _) = harness();
        let protocol =
            parse_expression("ap t ap t ap ap cons 0 ap ap cons nil nil").unwrap();
        let err = interact(&ev, &protocol, ast::num(1), ast::nil()).unwrap_err();
        assert!(matches!(err, Error::TypeError(_)));
    }

    #[test]
    fn test_send_value_round_trips_through_the_codec() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let ev = Evaluator::new(Environment::global()).with_transport(Box::new(
            ScriptedTransport {
                calls: calls.clone(),
                // the endpoint answers with the list [1]
                responses: RefCell::new(VecDeque::from(["110110000100".to_string()])),
            },
        ));
        let response = send_value(&ev, &ast::num(0)).unwrap();
        assert_eq!(*calls.borrow(), vec!["010".to_string()]);
        let (head, _) = ev.as_pair(&response).unwrap();
        assert_eq!(ev.as_number(&head).unwrap(), BigInt::from(1));
    }

    #[test]
    fn test_send_without_credentials_is_a_configuration_error() {
        let ev = Evaluator::new(Environment::global());
        assert!(matches!(
            send_value(&ev, &ast::nil()).unwrap_err(),
            Error::ConfigurationError(_)
        ));
        // the language-level binding takes the same path
        let err = ev
            .force(&parse_expression("ap send nil").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::ConfigurationError(_)));
    }

    #[test]
    fn test_http_transport_requires_a_key_before_any_network_attempt() {
        let transport = HttpTransport::new("http://127.0.0.1:1", None);
        assert!(matches!(
            transport.send("00").unwrap_err(),
            Error::ConfigurationError(_)
        ));
    }

    #[test]
    fn test_initial_state_shape() {
        let ev = Evaluator::new(Environment::global());
        assert_eq!(
            modem::format_readable(&ev, &initial_state()).unwrap(),
            "(cons 1 (cons (cons 11 nil) (cons 0 (cons nil nil))))"
        );
    }

    #[test]
    fn test_interact_loop_runs_until_termination() {
        let (ev, calls, frames) = harness();
        let mut input = ScriptedInput {
            events: VecDeque::from([Event::Click(0, 0), Event::Click(-3, 7), Event::Quit]),
        };
        interact_loop(&ev, &render_only_protocol(), &mut input).unwrap();
        assert_eq!(frames.borrow().len(), 2);
        assert_eq!(calls.borrow().len(), 0);
    }
}
