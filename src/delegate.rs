//! Pipeline cursor.
//!
//! A [`Delegate`] owns the middleware chain for one request. Each call to
//! [`Delegate::process`] runs the middleware at the cursor and advances it;
//! the middleware receives the delegate back so it can continue the chain.
//!
//! ```text
//! Delegate::process ─► cors.process(cx, delegate)
//!                          └─► Delegate::process ─► auth.process(cx, delegate)
//!                                                      └─► Delegate::process ─► terminal
//! ```
//!
//! The terminal is always the last link and never calls back. Once the cursor
//! is past the end, further calls go to the terminal again instead of running
//! off the chain.

use crate::error::Error;
use crate::middleware::Middleware;
use crate::output::Output;
use crate::request::Request;
use crate::response::Response;
use crate::route::RouteMatch;

/// Per-request values threaded through every middleware.
#[derive(Debug)]
pub struct Context<'r> {
    pub request: Request,
    pub route: &'r RouteMatch,
    pub output: Output,
}

impl<'r> Context<'r> {
    pub fn new(request: Request, route: &'r RouteMatch) -> Self {
        Self { request, route, output: Output::new() }
    }
}

/// The continuation handed to each middleware.
pub struct Delegate<'a> {
    chain: Vec<&'a dyn Middleware>,
    cursor: usize,
}

impl<'a> Delegate<'a> {
    /// A fresh cursor over `chain` followed by `terminal`.
    pub fn new(mut chain: Vec<&'a dyn Middleware>, terminal: &'a dyn Middleware) -> Self {
        chain.push(terminal);
        Self { chain, cursor: 0 }
    }

    /// Runs the next link. Errors propagate untouched.
    pub fn process(&mut self, cx: &mut Context<'_>) -> Result<Response, Error> {
        let last = self.chain.len() - 1;
        let middleware = self.chain[self.cursor.min(last)];
        if self.cursor <= last {
            self.cursor += 1;
        }
        middleware.process(cx, self)
    }

    /// Links not yet run, terminal included.
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use http::Method;

    /// Records entry and exit, optionally short-circuiting.
    struct Probe {
        name: &'static str,
        log: &'static Mutex<Vec<String>>,
        stop: bool,
    }

    impl Middleware for Probe {
        fn alias(&self) -> &str {
            self.name
        }

        fn process(&self, cx: &mut Context<'_>, next: &mut Delegate<'_>) -> Result<Response, Error> {
            self.log.lock().unwrap().push(format!("in:{}", self.name));
            if self.stop {
                return Ok(Response::new());
            }
            let mut res = next.process(cx)?;
            res.add_header("x-seen", self.name);
            self.log.lock().unwrap().push(format!("out:{}", self.name));
            Ok(res)
        }
    }

    struct Terminal {
        log: &'static Mutex<Vec<String>>,
    }

    impl Middleware for Terminal {
        fn alias(&self) -> &str {
            "terminal"
        }

        fn process(&self, _cx: &mut Context<'_>, _next: &mut Delegate<'_>) -> Result<Response, Error> {
            self.log.lock().unwrap().push("terminal".to_owned());
            Ok(Response::new())
        }
    }

    struct Failing;

    impl Middleware for Failing {
        fn alias(&self) -> &str {
            "failing"
        }

        fn process(&self, _cx: &mut Context<'_>, _next: &mut Delegate<'_>) -> Result<Response, Error> {
            Err(Error::forbidden("stop"))
        }
    }

    fn leak() -> &'static Mutex<Vec<String>> {
        Box::leak(Box::new(Mutex::new(Vec::new())))
    }

    fn context(route: &RouteMatch) -> Context<'_> {
        Context::new(Request::new(Method::GET, "/"), route)
    }

    #[test]
    fn runs_in_order_and_unwinds_in_reverse() {
        let log = leak();
        let a = Probe { name: "a", log, stop: false };
        let b = Probe { name: "b", log, stop: false };
        let terminal = Terminal { log };
        let route = RouteMatch::default();
        let mut cx = context(&route);

        let res = Delegate::new(vec![&a as &dyn Middleware, &b], &terminal).process(&mut cx).unwrap();

        assert_eq!(*log.lock().unwrap(), ["in:a", "in:b", "terminal", "out:b", "out:a"]);
        assert_eq!(res.header_line("x-seen").as_deref(), Some("b,a"));
    }

    #[test]
    fn short_circuit_skips_the_rest() {
        let log = leak();
        let a = Probe { name: "a", log, stop: true };
        let b = Probe { name: "b", log, stop: false };
        let terminal = Terminal { log };
        let route = RouteMatch::default();
        let mut cx = context(&route);

        let mut delegate = Delegate::new(vec![&a as &dyn Middleware, &b], &terminal);
        delegate.process(&mut cx).unwrap();

        assert_eq!(*log.lock().unwrap(), ["in:a"]);
        assert_eq!(delegate.remaining(), 2);
    }

    #[test]
    fn errors_propagate_to_the_caller() {
        let log = leak();
        let terminal = Terminal { log };
        let route = RouteMatch::default();
        let mut cx = context(&route);

        let err = Delegate::new(vec![&Failing as &dyn Middleware], &terminal).process(&mut cx).unwrap_err();

        assert_eq!(err.status(), Some(403));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn exhausted_cursor_stays_on_the_terminal() {
        let log = leak();
        let terminal = Terminal { log };
        let route = RouteMatch::default();
        let mut cx = context(&route);

        let mut delegate = Delegate::new(Vec::new(), &terminal);
        delegate.process(&mut cx).unwrap();
        delegate.process(&mut cx).unwrap();

        assert_eq!(*log.lock().unwrap(), ["terminal", "terminal"]);
        assert_eq!(delegate.remaining(), 0);
    }
}
