//! Dispatch orchestration.
//!
//! [`Kernel::handle`] is the per-request state machine:
//!
//! 1. filter the middleware pool down to the route's `pipe`, in pipe order;
//! 2. run the chain with the terminal resolver appended, or resolve directly
//!    when the chain is empty;
//! 3. catch whatever escapes, exactly once;
//! 4. commit when the envelope is successful;
//! 5. on a caught failure, a failed commit, or an envelope carrying an error,
//!    render the error through a fallback match and merge the result onto the
//!    in-flight envelope.
//!
//! `handle` never fails. Every error comes back as a rendered [`Response`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::Settings;
use crate::container::{Container, Registry};
use crate::delegate::{Context, Delegate};
use crate::error::Error;
use crate::handler::{Handler, Terminal};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::Response;
use crate::route::RouteMatch;
use crate::translator::{ErrorTranslator, Translators};

/// Transactional boundary run after a successful response.
pub trait Transaction: Send + Sync {
    /// A failure here fails the request. Implementations should return
    /// [`Error::Commit`].
    fn commit(&self) -> Result<(), Error>;
}

/// Commits nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTransaction;

impl Transaction for NoTransaction {
    fn commit(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// The request-lifecycle kernel. Build once, share across requests.
///
/// ```rust
/// use http::Method;
/// use kiln::{Callback, Cors, Function, Kernel, Request, RouteMatch, Settings};
///
/// let kernel = Kernel::builder(Settings::default())
///     .middleware(Cors::default())
///     .build()
///     .unwrap();
///
/// let route = RouteMatch::new("GET", "/ping/", "/ping", Callback::from(Function::new(|_, _| "pong")))
///     .with_pipe(["cors"]);
/// let res = kernel.handle(Request::new(Method::GET, "/ping"), &route);
///
/// assert_eq!(res.status_code(), 200);
/// assert_eq!(res.header_line("access-control-allow-origin").as_deref(), Some("*"));
/// ```
pub struct Kernel {
    settings: Settings,
    middleware: Vec<Arc<dyn Middleware>>,
    container: Arc<dyn Container>,
    translator: Arc<dyn ErrorTranslator>,
    transaction: Arc<dyn Transaction>,
}

impl Kernel {
    pub fn builder(settings: Settings) -> KernelBuilder {
        KernelBuilder::new(settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs one request through the pipeline and returns the final envelope.
    pub fn handle(&self, request: Request, route: &RouteMatch) -> Response {
        let handler = Handler::new(&self.settings, self.container.as_ref(), self.translator.as_ref());
        let mut cx = Context::new(request, route);

        let (mut response, mut failure) = match self.run(&handler, &mut cx) {
            Ok(response) => (response, None),
            Err(error) => (Response::new(), Some(Arc::new(error))),
        };

        if failure.is_none() && response.is_success() {
            if let Err(error) = self.transaction.commit() {
                error!("commit failed: {error}");
                failure = Some(Arc::new(error));
            }
        }

        if let Some(error) = failure.or_else(|| response.error().cloned()) {
            self.fallback(&handler, &mut cx, &mut response, error);
        }
        response
    }

    fn run(&self, handler: &Handler<'_>, cx: &mut Context<'_>) -> Result<Response, Error> {
        let chain = self.pipeline(cx.route);
        debug!(uri = %cx.request.uri(), path = %cx.route.path, middleware = chain.len(), "dispatching");

        if chain.is_empty() {
            return handler.resolve(&cx.request, cx.route, &mut cx.output);
        }
        let terminal = Terminal::new(handler);
        Delegate::new(chain, &terminal).process(cx)
    }

    /// Pool members named by the route's `pipe`, in pipe order.
    ///
    /// Every pool member carrying a piped alias runs, in registration order.
    /// An alias listed twice in the pipe still runs its members once.
    fn pipeline(&self, route: &RouteMatch) -> Vec<&dyn Middleware> {
        let Some(pipe) = &route.options.pipe else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        pipe.iter()
            .filter(|alias| seen.insert(alias.as_str()))
            .flat_map(|alias| self.middleware.iter().filter(move |m| m.alias() == alias.as_str()))
            .map(|m| &**m)
            .collect()
    }

    fn fallback(&self, handler: &Handler<'_>, cx: &mut Context<'_>, response: &mut Response, error: Arc<Error>) {
        warn!(kind = %error.kind(), status = ?error.status(), "rendering failure: {error}");
        let route = RouteMatch::fallback(Arc::clone(&error));
        let rendered = handler.resolve(&cx.request, &route, &mut cx.output).unwrap_or_else(|e| {
            error!("fallback dispatch failed: {e}");
            let mut bare = Response::new();
            bare.set_status(self.settings.status.fail);
            bare
        });
        response.merge(rendered).set_error(error);
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("settings", &self.settings)
            .field("middleware", &self.middleware.iter().map(|m| m.alias()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Kernel`].
pub struct KernelBuilder {
    settings: Settings,
    middleware: Vec<Arc<dyn Middleware>>,
    container: Arc<dyn Container>,
    translators: Translators,
    transaction: Arc<dyn Transaction>,
}

impl KernelBuilder {
    pub fn new(settings: Settings) -> Self {
        let translators = Translators::new(settings.status.fail);
        Self {
            settings,
            middleware: Vec::new(),
            container: Arc::new(Registry::new()),
            translators,
            transaction: Arc::new(NoTransaction),
        }
    }

    /// Adds `middleware` to the candidate pool. Routes opt in by alias.
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn container(mut self, container: impl Container + 'static) -> Self {
        self.container = Arc::new(container);
        self
    }

    /// Registers an error translator under `name`; select it with
    /// `Settings::error_translator`.
    pub fn translator(mut self, name: &str, translator: impl ErrorTranslator + 'static) -> Self {
        self.translators.register(name, Arc::new(translator));
        self
    }

    pub fn transaction(mut self, transaction: impl Transaction + 'static) -> Self {
        self.transaction = Arc::new(transaction);
        self
    }

    /// Fails when the configured error translator is not registered.
    pub fn build(self) -> Result<Kernel, Error> {
        let translator = self.translators.resolve(&self.settings.error_translator)?;
        Ok(Kernel {
            settings: self.settings,
            middleware: self.middleware,
            container: self.container,
            translator,
            transaction: self.transaction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::Method;
    use serde_json::{Map, Value, json};

    use crate::handler::Function;
    use crate::route::Callback;

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn alias(&self) -> &str {
            self.0
        }

        fn process(&self, cx: &mut Context<'_>, next: &mut Delegate<'_>) -> Result<Response, Error> {
            let mut res = next.process(cx)?;
            res.add_header("x-trail", self.0);
            Ok(res)
        }
    }

    /// Marks the envelope as failed after the handler ran.
    struct Audit;

    impl Middleware for Audit {
        fn alias(&self) -> &str {
            "audit"
        }

        fn process(&self, cx: &mut Context<'_>, next: &mut Delegate<'_>) -> Result<Response, Error> {
            let mut res = next.process(cx)?;
            res.header("x-audit", "seen").set_error(Arc::new(Error::runtime(409, "stale record")));
            Ok(res)
        }
    }

    struct Deny;

    impl Middleware for Deny {
        fn alias(&self) -> &str {
            "deny"
        }

        fn process(&self, _cx: &mut Context<'_>, _next: &mut Delegate<'_>) -> Result<Response, Error> {
            Err(Error::forbidden("keep out"))
        }
    }

    struct Counting(&'static AtomicUsize, bool);

    impl Transaction for Counting {
        fn commit(&self) -> Result<(), Error> {
            self.0.fetch_add(1, Ordering::SeqCst);
            if self.1 { Err(Error::Commit("deadlock".into())) } else { Ok(()) }
        }
    }

    fn pong() -> Callback {
        Function::new(|_, _| json!({ "pong": true })).into()
    }

    fn kernel() -> KernelBuilder {
        Kernel::builder(Settings::default())
            .middleware(Tag("a"))
            .middleware(Tag("b"))
            .middleware(Audit)
            .middleware(Deny)
    }

    fn get() -> Request {
        Request::new(Method::GET, "/ping")
    }

    fn body(res: &Response) -> Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    #[test]
    fn pipe_order_decides_execution_order() {
        let k = kernel().build().unwrap();
        let route = RouteMatch::new("GET", "/ping/", "/ping", pong()).with_pipe(["b", "a", "b", "ghost"]);
        let res = k.handle(get(), &route);
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.header_line("x-trail").as_deref(), Some("a,b"));
    }

    #[test]
    fn every_pool_member_sharing_an_alias_runs() {
        struct Stamp(&'static str);

        impl Middleware for Stamp {
            fn alias(&self) -> &str {
                "stamp"
            }

            fn process(&self, cx: &mut Context<'_>, next: &mut Delegate<'_>) -> Result<Response, Error> {
                let mut res = next.process(cx)?;
                res.add_header("x-stamp", self.0);
                Ok(res)
            }
        }

        let k = Kernel::builder(Settings::default())
            .middleware(Stamp("one"))
            .middleware(Tag("a"))
            .middleware(Stamp("two"))
            .build()
            .unwrap();
        let route = RouteMatch::new("GET", "/ping/", "/ping", pong()).with_pipe(["stamp", "a", "stamp"]);
        let res = k.handle(get(), &route);

        assert_eq!(res.header_line("x-stamp").as_deref(), Some("two,one"));
        assert_eq!(res.header_line("x-trail").as_deref(), Some("a"));
    }

    #[test]
    fn out_of_range_statuses_render_as_unknown() {
        let k = kernel().build().unwrap();
        let odd = Function::new(|_, _| -> Result<Value, Error> { Err(Error::runtime(42, "odd")) });
        let res = k.handle(get(), &RouteMatch::new("GET", "/ping/", "/ping", odd.into()));

        assert_eq!(res.status_code(), 42);
        assert_eq!(body(&res)["status"], json!({ "code": 42, "phrase": "", "type": "unknown" }));
        assert!(!res.is_success() && !res.is_fail() && !res.is_error());
    }

    #[test]
    fn no_pipe_means_no_middleware() {
        let k = kernel().build().unwrap();
        let route = RouteMatch::new("GET", "/ping/", "/ping", pong());
        let res = k.handle(get(), &route);
        assert!(!res.has_header("x-trail"));
        assert_eq!(body(&res)["data"], json!({ "pong": true }));
    }

    #[test]
    fn escaped_errors_are_rendered_by_the_fallback() {
        let k = kernel().build().unwrap();
        let route = RouteMatch::new("GET", "/ping/", "/ping", pong()).with_pipe(["a", "deny"]);
        let res = k.handle(get(), &route);

        assert_eq!(res.status_code(), 403);
        assert_eq!(body(&res)["status"]["type"], "fail");
        assert_eq!(body(&res)["data"]["message"], "keep out");
        assert!(res.error().is_some());
        assert!(!res.has_header("x-trail"));
    }

    #[test]
    fn attached_errors_keep_in_flight_headers() {
        let k = kernel().build().unwrap();
        let route = RouteMatch::new("GET", "/ping/", "/ping", pong()).with_pipe(["audit"]);
        let res = k.handle(get(), &route);

        assert_eq!(res.status_code(), 409);
        assert_eq!(res.header_line("x-audit").as_deref(), Some("seen"));
        assert_eq!(res.header_line("content-type").as_deref(), Some("application/json"));
        assert_eq!(body(&res)["data"]["message"], "stale record");
    }

    #[test]
    fn commit_runs_only_on_success() {
        static COMMITS: AtomicUsize = AtomicUsize::new(0);
        let k = kernel().transaction(Counting(&COMMITS, false)).build().unwrap();

        k.handle(get(), &RouteMatch::new("GET", "/ping/", "/ping", pong()));
        k.handle(get(), &RouteMatch::missing("GET", "/nope/"));
        k.handle(get(), &RouteMatch::new("GET", "/ping/", "/ping", pong()).with_pipe(["deny"]));

        assert_eq!(COMMITS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_commit_fails_the_request() {
        static COMMITS: AtomicUsize = AtomicUsize::new(0);
        let k = kernel().transaction(Counting(&COMMITS, true)).build().unwrap();
        let route = RouteMatch::new("GET", "/ping/", "/ping", pong()).with_pipe(["a"]);
        let res = k.handle(get(), &route);

        assert_eq!(res.status_code(), 500);
        assert_eq!(body(&res)["meta"]["error"]["kind"], "commit");
        assert_eq!(res.header_line("x-trail").as_deref(), Some("a"));
        assert!(res.is_error());
    }

    #[test]
    fn missing_routes_are_not_implemented() {
        let k = kernel().build().unwrap();
        let res = k.handle(get(), &RouteMatch::missing("GET", "/nope/"));
        assert_eq!(res.status_code(), 501);
        assert!(res.error().is_none());
    }

    #[test]
    fn unknown_translator_fails_the_build() {
        let settings = Settings { error_translator: "fancy".into(), ..Settings::default() };
        assert!(matches!(Kernel::builder(settings).build(), Err(Error::Configuration(_))));
    }

    #[test]
    fn named_translator_is_used_for_failures() {
        struct Teapot(Mutex<usize>);

        impl ErrorTranslator for Teapot {
            fn status(&self, _error: &Error, _meta: &Map<String, Value>) -> u16 {
                *self.0.lock().unwrap() += 1;
                418
            }

            fn meta(&self, _error: &Error, meta: Map<String, Value>) -> Map<String, Value> {
                meta
            }

            fn content(&self, _error: &Error, _meta: &Map<String, Value>) -> Value {
                json!("short and stout")
            }
        }

        let settings = Settings { error_translator: "teapot".into(), ..Settings::default() };
        let k = Kernel::builder(settings)
            .middleware(Deny)
            .translator("teapot", Teapot(Mutex::new(0)))
            .build()
            .unwrap();
        let res = k.handle(get(), &RouteMatch::new("GET", "/ping/", "/ping", pong()).with_pipe(["deny"]));

        assert_eq!(res.status_code(), 418);
        assert_eq!(body(&res)["data"], "short and stout");
    }
}
