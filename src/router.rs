//! Route lookup.
//!
//! The kernel consumes a [`RouteMatch`] and does not care where it came from.
//! [`Routes`] is that boundary; [`Router`] is a radix-tree implementation of
//! it, one tree per method.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::route::{Callback, RouteMatch, RouteOptions};

/// Produces the match for a request. Never fails: a miss is
/// [`RouteMatch::missing`].
pub trait Routes: Send + Sync {
    fn lookup(&self, method: &Method, uri: &str) -> RouteMatch;
}

struct Entry {
    template: String,
    callback: Callback,
    options: RouteOptions,
}

/// The application router.
///
/// Templates use `{name}` segments. A trailing `/` is not significant on
/// either side.
///
/// ```rust
/// use http::Method;
/// use kiln::{Router, Routes};
///
/// let router = Router::new()
///     .on(Method::GET, "/users/{id}", "Users@show")
///     .on(Method::POST, "/users", "Users@create");
///
/// let found = router.lookup(&Method::GET, "/users/42/");
/// assert_eq!(found.path, "/users/{id}");
/// assert_eq!(found.parameters, [("id".to_owned(), "42".to_owned())]);
///
/// assert!(router.lookup(&Method::DELETE, "/users/42/").is_missing());
/// ```
#[derive(Default)]
pub struct Router {
    trees: HashMap<Method, MatchitRouter<Arc<Entry>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for a method and template. Returns `self` for chaining.
    ///
    /// # Panics
    ///
    /// Panics if `template` is not a valid matchit route or conflicts with
    /// one already registered for `method`.
    pub fn on(self, method: Method, template: &str, callback: impl Into<Callback>) -> Self {
        self.route(method, template, callback, RouteOptions::default())
    }

    /// Like [`on`](Router::on), with per-route options.
    ///
    /// ```rust
    /// use http::Method;
    /// use kiln::{CorsPolicy, RouteOptions, Router};
    ///
    /// let router = Router::new().route(
    ///     Method::PUT,
    ///     "/users/{id}",
    ///     "Users@update",
    ///     RouteOptions {
    ///         pipe: Some(vec!["cors".into()]),
    ///         cors: Some(CorsPolicy::Origin("https://app.example.com".into())),
    ///         ..RouteOptions::default()
    ///     },
    /// );
    /// ```
    pub fn route(
        mut self,
        method: Method,
        template: &str,
        callback: impl Into<Callback>,
        options: RouteOptions,
    ) -> Self {
        let template = trim(template);
        let entry = Arc::new(Entry { template: template.to_owned(), callback: callback.into(), options });
        self.trees
            .entry(method)
            .or_default()
            .insert(template, entry)
            .unwrap_or_else(|e| panic!("invalid route `{template}`: {e}"));
        self
    }
}

impl Routes for Router {
    fn lookup(&self, method: &Method, uri: &str) -> RouteMatch {
        let found = self.trees.get(method).and_then(|tree| tree.at(trim(uri)).ok());
        let Some(found) = found else {
            return RouteMatch::missing(method.as_str(), uri);
        };
        let entry = found.value;
        RouteMatch {
            method: method.as_str().to_owned(),
            uri: uri.to_owned(),
            path: entry.template.clone(),
            callback: entry.callback.clone(),
            parameters: found.params.iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect(),
            options: entry.options.clone(),
        }
    }
}

fn trim(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}
