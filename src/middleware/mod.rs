//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns. A route opts into middleware by listing aliases in
//! its `pipe` option; the kernel runs the matching middleware in pipe order,
//! then the terminal resolver.
//!
//! A middleware may
//! - inspect or rewrite `cx.request` before calling `next.process(cx)`,
//! - inspect or rewrite the response `next` returns,
//! - return a response without calling `next` at all (short-circuit),
//! - return an error, which unwinds to the kernel untouched.
//!
//! Built-in middleware:
//! - [`cors::Cors`]: preflight short-circuit and cross-origin headers (`"cors"`)

pub mod cors;

use crate::delegate::{Context, Delegate};
use crate::error::Error;
use crate::response::Response;

/// One link of the request pipeline.
///
/// ```rust
/// use kiln::{Context, Delegate, Error, Middleware, Response};
///
/// struct PoweredBy;
///
/// impl Middleware for PoweredBy {
///     fn alias(&self) -> &str {
///         "powered-by"
///     }
///
///     fn process(&self, cx: &mut Context<'_>, next: &mut Delegate<'_>) -> Result<Response, Error> {
///         let mut res = next.process(cx)?;
///         res.header("x-powered-by", "kiln");
///         Ok(res)
///     }
/// }
/// ```
pub trait Middleware: Send + Sync {
    /// Name routes use in their `pipe` option.
    fn alias(&self) -> &str;

    fn process(&self, cx: &mut Context<'_>, next: &mut Delegate<'_>) -> Result<Response, Error>;
}
