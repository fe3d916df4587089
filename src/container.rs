//! Service container contract and a registry-backed implementation.
//!
//! The kernel never constructs controllers or binds arguments itself. It asks
//! a [`Container`] to build the instance a callback names and to turn the
//! route's data map into an ordered argument list. Failures here are wiring
//! problems, reported as [`Error::Configuration`].

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::controller::{Arguments, Controller};
use crate::error::Error;
use crate::handler::Function;

/// Something the container built.
pub enum Instance {
    Controller(Box<dyn Controller>),
    /// A service that is not a controller. Routing to it is a configuration error.
    Service(Box<dyn Any + Send>),
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Controller(_) => f.write_str("Controller(..)"),
            Self::Service(_) => f.write_str("Service(..)"),
        }
    }
}

/// Builds instances by class name and binds call arguments.
pub trait Container: Send + Sync {
    fn make(&self, class: &str) -> Result<Instance, Error>;

    /// Arguments for `controller.method`, taken from `data`.
    fn resolve_method_parameters(
        &self,
        controller: &dyn Controller,
        method: &str,
        data: &Map<String, Value>,
        labels: bool,
    ) -> Result<Arguments, Error>;

    /// Arguments for an anonymous function, taken from `data`.
    fn resolve_function_parameters(
        &self,
        function: &Function,
        data: &Map<String, Value>,
        labels: bool,
    ) -> Result<Arguments, Error>;
}

type ControllerFactory = Box<dyn Fn() -> Box<dyn Controller> + Send + Sync>;
type ServiceFactory = Box<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

enum Factory {
    Controller(ControllerFactory),
    Service(ServiceFactory),
}

/// A [`Container`] backed by a name → factory map.
///
/// Named binding (`labels = true`) looks each declared parameter up in the
/// data map and passes `null` for absent ones. Positional binding, or a
/// target that declares no names, passes the data values in map order.
///
/// ```rust
/// use kiln::{Arguments, Controller, Error, Outcome, Output, Registry};
///
/// struct Home;
/// impl Controller for Home {
///     fn responds_to(&self, m: &str) -> bool { m == "index" }
///     fn call(&mut self, _: &str, _: Arguments, _: &mut Output) -> Result<Outcome, Error> {
///         Ok(Outcome::Empty)
///     }
/// }
///
/// let registry = Registry::new().controller("Home", || Home);
/// assert!(registry.contains("Home"));
/// ```
#[derive(Default)]
pub struct Registry {
    factories: HashMap<String, Factory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a controller under `class`. Returns `self` for chaining.
    pub fn controller<C, F>(mut self, class: &str, factory: F) -> Self
    where
        C: Controller + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.factories.insert(
            class.to_owned(),
            Factory::Controller(Box::new(move || -> Box<dyn Controller> { Box::new(factory()) })),
        );
        self
    }

    /// Registers a plain service under `class`.
    pub fn service<S, F>(mut self, class: &str, factory: F) -> Self
    where
        S: Any + Send,
        F: Fn() -> S + Send + Sync + 'static,
    {
        self.factories.insert(
            class.to_owned(),
            Factory::Service(Box::new(move || -> Box<dyn Any + Send> { Box::new(factory()) })),
        );
        self
    }

    pub fn contains(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("classes", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Container for Registry {
    fn make(&self, class: &str) -> Result<Instance, Error> {
        match self.factories.get(class) {
            Some(Factory::Controller(build)) => Ok(Instance::Controller(build())),
            Some(Factory::Service(build)) => Ok(Instance::Service(build())),
            None => Err(Error::configuration(format!("class `{class}` is not registered"))),
        }
    }

    fn resolve_method_parameters(
        &self,
        controller: &dyn Controller,
        method: &str,
        data: &Map<String, Value>,
        labels: bool,
    ) -> Result<Arguments, Error> {
        Ok(bind(controller.parameters(method), data, labels))
    }

    fn resolve_function_parameters(
        &self,
        function: &Function,
        data: &Map<String, Value>,
        labels: bool,
    ) -> Result<Arguments, Error> {
        let names: Vec<&str> = function.parameters().iter().map(String::as_str).collect();
        Ok(bind(&names, data, labels))
    }
}

fn bind(names: &[&str], data: &Map<String, Value>, labels: bool) -> Arguments {
    if labels && !names.is_empty() {
        return names.iter()
            .map(|name| data.get(*name).cloned().unwrap_or(Value::Null))
            .collect::<Vec<_>>()
            .into();
    }
    data.values().cloned().collect::<Vec<_>>().into()
}
