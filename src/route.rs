//! The route match handed over by a router.
//!
//! A [`RouteMatch`] describes how to serve one request: which template
//! matched, what to call, the extracted path parameters, and the per-route
//! options. A router must always produce one; a miss is a match with an
//! empty `path` and [`Callback::None`].

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::Error;
use crate::handler::Function;

/// What the terminal resolver should invoke.
#[derive(Clone, Default)]
pub enum Callback {
    /// Nothing to call. Renders as "not implemented".
    #[default]
    None,
    /// A failure to render, placed here by the fallback dispatch.
    Error(Arc<Error>),
    /// Explicit controller class and method.
    Pair { class: String, method: String },
    /// `"Class"` or `"Class<separator>method"`.
    Reference(String),
    /// An anonymous invocable.
    Function(Function),
}

impl Callback {
    /// A callback referencing `class`, with an optional method after the separator.
    pub fn reference(reference: impl Into<String>) -> Self {
        Self::Reference(reference.into())
    }

    pub fn pair(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self::Pair { class: class.into(), method: method.into() }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// `"Class"` or `"Class@method"`.
impl From<&str> for Callback {
    fn from(reference: &str) -> Self {
        Self::Reference(reference.to_owned())
    }
}

impl From<String> for Callback {
    fn from(reference: String) -> Self {
        Self::Reference(reference)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Self::Pair { class, method } => write!(f, "Pair({class}, {method})"),
            Self::Reference(r) => f.debug_tuple("Reference").field(r).finish(),
            Self::Function(_) => f.write_str("Function(<closure>)"),
        }
    }
}

/// Cross-origin policy a route declares for itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CorsPolicy {
    /// `true` allows every origin, `false` defers to the guard's configuration.
    Enabled(bool),
    /// Exactly this origin.
    Origin(String),
    /// Any origin in the list.
    Origins(Vec<String>),
}

/// Computes extra parameters from the path parameters.
pub type ComputeParameters = Arc<dyn Fn(&Map<String, Value>) -> Map<String, Value> + Send + Sync>;

/// Extra arguments merged into the path parameters before binding.
#[derive(Clone)]
pub enum Extra {
    Static(Map<String, Value>),
    Computed(ComputeParameters),
}

impl fmt::Debug for Extra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(map) => f.debug_tuple("Static").field(map).finish(),
            Self::Computed(_) => f.write_str("Computed(<closure>)"),
        }
    }
}

/// Per-route options.
#[derive(Clone, Debug)]
pub struct RouteOptions {
    /// Aliases of the middleware this route opts into, in execution order.
    pub pipe: Option<Vec<String>>,
    pub cors: Option<CorsPolicy>,
    /// Bind arguments by name (`true`) or by position.
    pub labels: bool,
    pub parameters: Option<Extra>,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self { pipe: None, cors: None, labels: true, parameters: None }
    }
}

/// One resolved route.
#[derive(Clone, Debug, Default)]
pub struct RouteMatch {
    pub method: String,
    pub uri: String,
    /// Matched template; empty when nothing matched.
    pub path: String,
    pub callback: Callback,
    /// Path parameters in template order.
    pub parameters: Vec<(String, String)>,
    pub options: RouteOptions,
}

impl RouteMatch {
    pub fn new(method: impl Into<String>, uri: impl Into<String>, path: impl Into<String>, callback: Callback) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            path: path.into(),
            callback,
            parameters: Vec::new(),
            options: RouteOptions::default(),
        }
    }

    /// The match a router returns when nothing matched.
    pub fn missing(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::new(method, uri, "", Callback::None)
    }

    /// Synthetic match used to render `error` through the terminal resolver.
    pub fn fallback(error: Arc<Error>) -> Self {
        Self::new("", "", "", Callback::Error(error))
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_pipe<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.pipe = Some(aliases.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_cors(mut self, policy: CorsPolicy) -> Self {
        self.options.cors = Some(policy);
        self
    }

    pub fn with_labels(mut self, labels: bool) -> Self {
        self.options.labels = labels;
        self
    }

    pub fn with_extra(mut self, extra: Extra) -> Self {
        self.options.parameters = Some(extra);
        self
    }

    /// `true` when the router found no route.
    pub fn is_missing(&self) -> bool {
        self.path.is_empty() && self.callback.is_none()
    }

    /// Path parameters merged with the route's extra parameters.
    ///
    /// Keys present on both sides end up as a list holding both values.
    pub fn data(&self) -> Map<String, Value> {
        let mut data: Map<String, Value> = self.parameters.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let extra = match &self.options.parameters {
            None => return data,
            Some(Extra::Static(map)) => map.clone(),
            Some(Extra::Computed(compute)) => compute(&data),
        };
        merge_recursive(&mut data, extra);
        data
    }
}

fn merge_recursive(into: &mut Map<String, Value>, from: Map<String, Value>) {
    for (key, value) in from {
        match into.get_mut(&key) {
            None => {
                into.insert(key, value);
            }
            Some(Value::Object(left)) if value.is_object() => {
                if let Value::Object(right) = value {
                    merge_recursive(left, right);
                }
            }
            Some(existing) => {
                let mut list = match existing.take() {
                    Value::Array(items) => items,
                    other => vec![other],
                };
                match value {
                    Value::Array(items) => list.extend(items),
                    other => list.push(other),
                }
                *existing = Value::Array(list);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn missing_match_has_no_path_and_no_callback() {
        let m = RouteMatch::missing("GET", "/nope/");
        assert!(m.is_missing());
        assert!(!RouteMatch::new("GET", "/", "/", Callback::reference("Home")).is_missing());
    }

    #[test]
    fn options_default_to_named_binding() {
        let m = RouteMatch::default();
        assert!(m.options.labels);
        assert!(m.options.pipe.is_none());
    }

    #[test]
    fn data_keeps_parameter_order() {
        let m = RouteMatch::new("GET", "/a/1/b/2/", "/a/{x}/b/{y}", Callback::None)
            .with_parameter("x", "1")
            .with_parameter("y", "2");
        let keys: Vec<_> = m.data().keys().cloned().collect();
        assert_eq!(keys, ["x", "y"]);
    }

    #[test]
    fn static_extras_merge_recursively() {
        let m = RouteMatch::default()
            .with_parameter("id", "42")
            .with_extra(Extra::Static(object(json!({ "id": "7", "scope": "admin" }))));
        assert_eq!(Value::Object(m.data()), json!({ "id": ["42", "7"], "scope": "admin" }));
    }

    #[test]
    fn computed_extras_see_the_path_parameters() {
        let compute: ComputeParameters = Arc::new(|data| {
            let id = data.get("id").and_then(Value::as_str).unwrap_or_default();
            object(json!({ "double": format!("{id}{id}") }))
        });
        let m = RouteMatch::default()
            .with_parameter("id", "4")
            .with_extra(Extra::Computed(compute));
        assert_eq!(m.data()["double"], "44");
    }
}
