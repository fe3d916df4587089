//! Cross-origin resource sharing guard.
//!
//! Two branches, picked by the request method:
//!
//! - `OPTIONS` (preflight): the `Origin` header is checked against the
//!   allow-list, a fresh empty response is decorated and returned, and the
//!   rest of the pipeline never runs.
//! - anything else: the pipeline runs and its response is decorated.
//!
//! A rejected origin is a [`Error::Forbidden`], raised to the kernel so it is
//! rendered like any other failure.

use http::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::list_var;
use crate::delegate::{Context, Delegate};
use crate::error::Error;
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::Response;
use crate::route::{CorsPolicy, RouteMatch};

const ORIGIN: &str = "origin";
const REQUEST_METHOD: &str = "access-control-request-method";
const REQUEST_HEADERS: &str = "access-control-request-headers";

/// The `"cors"` middleware.
///
/// An empty allow-list admits every origin and answers with
/// `Access-Control-Allow-Origin: *`. A non-empty list admits its members only
/// and echoes the request's `Origin`. A route may carry its own policy in
/// [`RouteOptions::cors`](crate::RouteOptions), which takes precedence.
///
/// ```rust
/// use kiln::Cors;
///
/// let cors = Cors::new(["https://example.com"]).expose_headers(["x-request-id"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Cors {
    origins: Vec<String>,
    expose: Vec<String>,
}

impl Cors {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { origins: origins.into_iter().map(Into::into).collect(), expose: Vec::new() }
    }

    /// Headers listed in `Access-Control-Expose-Headers`.
    pub fn expose_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expose = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Reads `KILN_CORS_ORIGINS` and `KILN_CORS_EXPOSE` (comma-separated).
    pub fn from_env() -> Self {
        Self::new(list_var("KILN_CORS_ORIGINS")).expose_headers(list_var("KILN_CORS_EXPOSE"))
    }

    /// Effective allow-list for `route`. Empty means every origin.
    fn allowed<'a>(&'a self, route: &'a RouteMatch) -> &'a [String] {
        match &route.options.cors {
            Some(CorsPolicy::Enabled(true)) => &[],
            Some(CorsPolicy::Origin(origin)) => std::slice::from_ref(origin),
            Some(CorsPolicy::Origins(origins)) => origins,
            Some(CorsPolicy::Enabled(false)) | None => &self.origins,
        }
    }

    fn validate(&self, request: &Request, allowed: &[String]) -> Result<(), Error> {
        if allowed.is_empty() {
            return Ok(());
        }
        let origin = request.header(ORIGIN).unwrap_or_default();
        if allowed.iter().any(|a| a == origin) {
            return Ok(());
        }
        warn!(%origin, "rejecting cross-origin preflight");
        Err(Error::forbidden(format!("The origin `{origin}` is not allowed")))
    }

    fn decorate(&self, request: &Request, allowed: &[String], response: &mut Response) {
        let origin = if allowed.is_empty() { "*" } else { request.header(ORIGIN).unwrap_or_default() };
        response.header("access-control-allow-origin", origin);
        if !self.expose.is_empty() {
            response.header("access-control-expose-headers", self.expose.join(","));
        }
        response
            .header("access-control-allow-credentials", "true")
            .header("access-control-max-age", "86400");
    }
}

impl Middleware for Cors {
    fn alias(&self) -> &str {
        "cors"
    }

    fn process(&self, cx: &mut Context<'_>, next: &mut Delegate<'_>) -> Result<Response, Error> {
        let route = cx.route;
        let allowed = self.allowed(route);

        if *cx.request.method() == Method::OPTIONS {
            self.validate(&cx.request, allowed)?;

            let request = &cx.request;
            let mut response = Response::new();
            self.decorate(request, allowed, &mut response);
            response
                .plain(&Value::Null, None)
                .clear_body()
                .header("access-control-allow-methods", request.header(REQUEST_METHOD).unwrap_or_default())
                .header("access-control-allow-headers", request.header(REQUEST_HEADERS).unwrap_or_default());
            debug!(uri = %request.uri(), "answered preflight");
            return Ok(response);
        }

        let mut response = next.process(cx)?;
        self.decorate(&cx.request, allowed, &mut response);
        Ok(response)
    }
}
