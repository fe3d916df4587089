//! Terminal resolution and content negotiation.
//!
//! # From callback to envelope
//!
//! The [`Handler`] is the last link of every pipeline. It turns the route's
//! [`Callback`] into something to invoke, invokes it, and renders whatever
//! came back:
//!
//! ```text
//! Callback::None            ─────────────────────────────► parse(Empty)
//! Callback::Error(e)        ─────────────────────────────► parse(Failure(e))
//! Callback::Function(f)     ─► container binds args ─► f ─► parse(result)
//! Callback::Pair/Reference  ─► container.make(class)
//!                              ─► boot ─► pick method ─► bind args ─► call ─► parse(result)
//! ```
//!
//! `parse` is content negotiation: a returned [`Response`] passes through with
//! only its `output` meta stamped; anything else gets a status (success,
//! not-found, not-implemented, or whatever the error translator says) and is
//! written by the configured [`ContentKind`](crate::ContentKind) writer.
//!
//! Errors raised *by the invoked code* are rendered here. Errors raised while
//! *resolving* the target (unknown class, not a controller, argument binding)
//! propagate to the kernel, which renders them through the fallback dispatch.

use std::fmt;
use std::sync::Arc;

use heck::ToLowerCamelCase;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Settings;
use crate::container::{Container, Instance};
use crate::controller::{Arguments, INVOKE};
use crate::delegate::{Context, Delegate};
use crate::error::Error;
use crate::middleware::Middleware;
use crate::output::Output;
use crate::request::Request;
use crate::response::Response;
use crate::route::{Callback, RouteMatch};
use crate::translator::ErrorTranslator;

// ── Outcome ───────────────────────────────────────────────────────────────────

/// What application code produced.
#[derive(Debug)]
pub enum Outcome {
    /// A finished envelope, passed through as is.
    Response(Response),
    /// Data for the configured writer.
    Data(Value),
    /// Nothing. Renders as "not implemented".
    Empty,
    /// A failure to render through the error translator.
    Failure(Arc<Error>),
}

/// Conversion into an [`Outcome`].
///
/// Implemented for the usual handler return types so functions and
/// controllers can return them directly:
///
/// ```rust
/// use kiln::{IntoOutcome, Outcome};
/// use serde_json::json;
///
/// assert!(matches!(json!({ "id": 1 }).into_outcome(), Ok(Outcome::Data(_))));
/// assert!(matches!(().into_outcome(), Ok(Outcome::Empty)));
/// assert!(matches!(None::<String>.into_outcome(), Ok(Outcome::Empty)));
/// ```
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<Outcome, Error>;
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> Result<Outcome, Error> { Ok(self) }
}

impl IntoOutcome for Response {
    fn into_outcome(self) -> Result<Outcome, Error> { Ok(Outcome::Response(self)) }
}

/// `null` counts as no result.
impl IntoOutcome for Value {
    fn into_outcome(self) -> Result<Outcome, Error> {
        Ok(match self {
            Value::Null => Outcome::Empty,
            other => Outcome::Data(other),
        })
    }
}

impl IntoOutcome for String {
    fn into_outcome(self) -> Result<Outcome, Error> { Ok(Outcome::Data(Value::String(self))) }
}

impl IntoOutcome for &'static str {
    fn into_outcome(self) -> Result<Outcome, Error> { Ok(Outcome::Data(Value::from(self))) }
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<Outcome, Error> { Ok(Outcome::Empty) }
}

impl<T: IntoOutcome> IntoOutcome for Option<T> {
    fn into_outcome(self) -> Result<Outcome, Error> {
        self.map_or(Ok(Outcome::Empty), IntoOutcome::into_outcome)
    }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<Error>,
{
    fn into_outcome(self) -> Result<Outcome, Error> {
        match self {
            Ok(value) => value.into_outcome(),
            Err(error) => Err(error.into()),
        }
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// The handler context an anonymous function is bound to.
pub struct Scope<'a> {
    pub request: &'a Request,
    pub route: &'a RouteMatch,
    /// The envelope the result will be rendered into.
    pub response: &'a mut Response,
    pub output: &'a mut Output,
}

impl Scope<'_> {
    /// Records incidental output in the diagnostic sink.
    pub fn write(&mut self, contents: impl Into<String>) {
        self.output.write(contents);
    }
}

trait ErasedFunction: Send + Sync {
    fn call(&self, scope: &mut Scope<'_>, args: Arguments) -> Result<Outcome, Error>;
}

/// Bridges a concrete closure to the trait object stored in [`Function`].
struct FnFunction<F>(F);

impl<F, R> ErasedFunction for FnFunction<F>
where
    F: Fn(&mut Scope<'_>, Arguments) -> R + Send + Sync,
    R: IntoOutcome,
{
    fn call(&self, scope: &mut Scope<'_>, args: Arguments) -> Result<Outcome, Error> {
        (self.0)(scope, args).into_outcome()
    }
}

/// An anonymous invocable route target.
///
/// Cloning is one `Arc` increment; the closure is shared, not copied.
///
/// ```rust
/// use kiln::{Callback, Function};
///
/// let hello = Function::new(|scope, args| {
///     scope.write("debug line");
///     format!("hello {}", args.str(0).unwrap_or("world"))
/// })
/// .with_parameters(["name"]);
///
/// let callback = Callback::from(hello);
/// ```
#[derive(Clone)]
pub struct Function {
    inner: Arc<dyn ErasedFunction>,
    parameters: Vec<String>,
}

impl Function {
    pub fn new<F, R>(f: F) -> Self
    where
        F: Fn(&mut Scope<'_>, Arguments) -> R + Send + Sync + 'static,
        R: IntoOutcome + 'static,
    {
        Self { inner: Arc::new(FnFunction(f)), parameters: Vec::new() }
    }

    /// Declares parameter names for named binding.
    pub fn with_parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn call(&self, scope: &mut Scope<'_>, args: Arguments) -> Result<Outcome, Error> {
        self.inner.call(scope, args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("parameters", &self.parameters).finish()
    }
}

impl From<Function> for Callback {
    fn from(function: Function) -> Self {
        Callback::Function(function)
    }
}

// ── Handler ───────────────────────────────────────────────────────────────────

/// Resolves and invokes route targets, then negotiates the response.
#[derive(Clone, Copy)]
pub struct Handler<'k> {
    settings: &'k Settings,
    container: &'k dyn Container,
    translator: &'k dyn ErrorTranslator,
}

impl<'k> Handler<'k> {
    pub fn new(settings: &'k Settings, container: &'k dyn Container, translator: &'k dyn ErrorTranslator) -> Self {
        Self { settings, container, translator }
    }

    /// Resolves `route.callback`, invokes it, and renders the result.
    pub fn resolve(&self, request: &Request, route: &RouteMatch, output: &mut Output) -> Result<Response, Error> {
        match &route.callback {
            Callback::None => Ok(self.parse(route, Outcome::Empty, Response::new(), output)),
            Callback::Error(error) => {
                Ok(self.parse(route, Outcome::Failure(Arc::clone(error)), Response::new(), output))
            }
            Callback::Function(function) => {
                let args = self.container.resolve_function_parameters(function, &route.data(), route.options.labels)?;
                let mut draft = Response::new();
                let result = function.call(
                    &mut Scope { request, route, response: &mut draft, output: &mut *output },
                    args,
                );
                Ok(self.parse(route, settle(result), draft, output))
            }
            Callback::Pair { .. } | Callback::Reference(_) => self.controller(request, route, output),
        }
    }

    fn controller(&self, request: &Request, route: &RouteMatch, output: &mut Output) -> Result<Response, Error> {
        let Some((class, method)) = self.target(route) else {
            return Ok(self.parse(route, Outcome::Empty, Response::new(), output));
        };

        let mut controller = match self.container.make(&class)? {
            Instance::Controller(controller) => controller,
            Instance::Service(_) => {
                return Err(Error::configuration(format!("the class must be a controller, `{class}` given")));
            }
        };

        let mut draft = Response::new();
        controller.boot(request, &mut draft, route);

        let method = match method {
            Some(m) if controller.responds_to(&m) => Some(m),
            _ if controller.is_invocable() => Some(INVOKE.to_owned()),
            other => other,
        };
        let Some(method) = method else {
            return Ok(self.parse(route, Outcome::Empty, draft, output));
        };

        let args = self.container.resolve_method_parameters(
            controller.as_ref(),
            &method,
            &route.data(),
            route.options.labels,
        )?;
        debug!(%class, %method, args = args.len(), "invoking controller");
        let result = controller.call(&method, args, output);
        Ok(self.parse(route, settle(result), draft, output))
    }

    /// Splits a controller callback into class and method.
    ///
    /// A reference without a method part takes the camel-cased last segment
    /// of the matched URI as method name. Only the second separated part
    /// names the method; anything after it is ignored. An empty method name
    /// is `None`.
    fn target(&self, route: &RouteMatch) -> Option<(String, Option<String>)> {
        let (class, method) = match &route.callback {
            Callback::Pair { class, method } => (class.clone(), method.clone()),
            Callback::Reference(reference) => {
                let separator = self.settings.separator.as_str();
                if separator.is_empty() || !reference.contains(separator) {
                    (reference.clone(), method_from_uri(&route.uri))
                } else {
                    let mut parts = reference.split(separator);
                    let class = parts.next().unwrap_or_default().to_owned();
                    (class, parts.next().unwrap_or_default().to_owned())
                }
            }
            _ => return None,
        };
        Some((class, Some(method).filter(|m| !m.is_empty())))
    }

    /// Content negotiation: renders `outcome` into `draft`.
    pub fn parse(&self, route: &RouteMatch, outcome: Outcome, mut draft: Response, output: &Output) -> Response {
        let keys = &self.settings.keys;
        let captured = if self.settings.test_mode { output.to_value() } else { Value::Array(Vec::new()) };

        let outcome = match outcome {
            Outcome::Response(mut response) => {
                response.meta("output", captured, &keys.meta);
                return response;
            }
            other => other,
        };

        let codes = self.settings.status;
        let mut status = codes.success;
        if route.path.is_empty() {
            status = codes.not_found;
        }
        if matches!(outcome, Outcome::Empty) {
            status = codes.not_implemented;
        }

        let mut meta = Map::new();
        meta.insert("output".to_owned(), captured);

        let content = match outcome {
            Outcome::Failure(error) => {
                status = self.translator.status(&error, &meta);
                meta = self.translator.meta(&error, meta);
                self.translator.content(&error, &meta)
            }
            Outcome::Data(value) => value,
            Outcome::Empty | Outcome::Response(_) => Value::Null,
        };

        draft.render(self.settings.response_type, content, status, Value::Object(meta), keys);
        draft
    }
}

fn settle(result: Result<Outcome, Error>) -> Outcome {
    result.unwrap_or_else(|error| {
        debug!(kind = %error.kind(), "handler raised: {error}");
        Outcome::Failure(Arc::new(error))
    })
}

/// `/users/show-profile/` → `showProfile`.
fn method_from_uri(uri: &str) -> String {
    uri.split('/')
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| segment.to_lower_camel_case())
        .unwrap_or_default()
}

// ── Terminal middleware ───────────────────────────────────────────────────────

/// The last link of every pipeline. Ignores its delegate and resolves the route.
pub struct Terminal<'a> {
    handler: &'a Handler<'a>,
}

impl<'a> Terminal<'a> {
    pub fn new(handler: &'a Handler<'a>) -> Self {
        Self { handler }
    }
}

impl Middleware for Terminal<'_> {
    fn alias(&self) -> &str {
        ""
    }

    fn process(&self, cx: &mut Context<'_>, _next: &mut Delegate<'_>) -> Result<Response, Error> {
        self.handler.resolve(&cx.request, cx.route, &mut cx.output)
    }
}
