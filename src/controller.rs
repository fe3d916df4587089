//! Controller capability.
//!
//! A controller is an application type the service container can build by
//! name. The terminal resolver boots it with the request context, then calls
//! one of its methods by name. Method lookup goes through
//! [`Controller::responds_to`] and [`Controller::call`]; there is no
//! reflection, each controller matches on the names it supports.

use serde_json::Value;

use crate::error::Error;
use crate::handler::Outcome;
use crate::output::Output;
use crate::request::Request;
use crate::response::Response;
use crate::route::RouteMatch;

/// Name of the default entry point of invocable controllers.
pub const INVOKE: &str = "__invoke";

/// Application controller.
///
/// ```rust
/// use kiln::{Arguments, Controller, Error, IntoOutcome, Outcome, Output};
/// use serde_json::json;
///
/// struct Users;
///
/// impl Controller for Users {
///     fn responds_to(&self, method: &str) -> bool {
///         method == "show"
///     }
///
///     fn parameters(&self, _method: &str) -> &[&str] {
///         &["id"]
///     }
///
///     fn call(&mut self, method: &str, args: Arguments, _out: &mut Output) -> Result<Outcome, Error> {
///         match method {
///             "show" => json!({ "id": args.str(0) }).into_outcome(),
///             other => Err(Error::undefined_method("Users", other)),
///         }
///     }
/// }
/// ```
pub trait Controller: Send {
    /// Runs once before the method call with the request context and the
    /// response the result will be rendered into.
    fn boot(&mut self, _request: &Request, _response: &mut Response, _route: &RouteMatch) {}

    /// Whether `method` names an action of this controller.
    fn responds_to(&self, method: &str) -> bool;

    /// Whether the controller has a default entry point, called as [`INVOKE`]
    /// when the resolved method does not exist.
    fn is_invocable(&self) -> bool {
        false
    }

    /// Declared parameter names of `method`, in call order.
    ///
    /// Used by the container for named binding. Empty means positional.
    fn parameters(&self, _method: &str) -> &[&str] {
        &[]
    }

    /// Invokes `method`. Incidental output goes to `out`.
    fn call(&mut self, method: &str, args: Arguments, out: &mut Output) -> Result<Outcome, Error>;
}

/// Resolved call arguments, in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments(Vec<Value>);

impl Arguments {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Argument `index` as a string, if it is one.
    pub fn str(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}
