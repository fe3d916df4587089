//! # kiln
//!
//! The request-lifecycle kernel of a small HTTP framework.
//!
//! Given a matched route and a pool of middleware, kiln builds the pipeline
//! the route asks for, runs it, resolves the application callback at the end
//! of it, and turns whatever came back (data, nothing, a finished response,
//! or a failure) into one well-formed response envelope.
//!
//! ## The lifecycle
//!
//! ```text
//! Routes::lookup ─► RouteMatch
//!                       │
//! Kernel::handle ───────┤ filter pool by `pipe`
//!                       ▼
//!               Delegate ─► cors ─► auth ─► Terminal ─► Handler::resolve
//!                                                          │ container.make / bind
//!                                                          │ controller.boot / call
//!                                                          ▼
//!                                                   content negotiation
//!                       ┌──────────────────────────────────┘
//!                       ▼
//!               commit on success │ fallback dispatch on failure
//!                       ▼
//!                   Response ─► Server ─► wire
//! ```
//!
//! Failures are caught once, in [`Kernel::handle`], and rendered through the
//! same negotiation path as results. Clients always get a body and a status.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::Method;
//! use kiln::{Arguments, Controller, Cors, Error, IntoOutcome, Kernel, Outcome, Output,
//!            Registry, RouteOptions, Router, Server, Settings};
//! use serde_json::json;
//!
//! struct Users;
//!
//! impl Controller for Users {
//!     fn responds_to(&self, method: &str) -> bool {
//!         method == "show"
//!     }
//!
//!     fn parameters(&self, _method: &str) -> &[&str] {
//!         &["id"]
//!     }
//!
//!     fn call(&mut self, method: &str, args: Arguments, _out: &mut Output) -> Result<Outcome, Error> {
//!         match method {
//!             "show" => json!({ "id": args.str(0), "name": "alice" }).into_outcome(),
//!             other => Err(Error::undefined_method("Users", other)),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let kernel = Kernel::builder(Settings::from_env())
//!         .middleware(Cors::from_env())
//!         .container(Registry::new().controller("Users", || Users))
//!         .build()?;
//!
//!     let routes = Router::new().route(
//!         Method::GET,
//!         "/users/{id}",
//!         "Users@show",
//!         RouteOptions { pipe: Some(vec!["cors".into()]), ..RouteOptions::default() },
//!     );
//!
//!     Server::bind("0.0.0.0:3000").serve(kernel, routes).await
//! }
//! ```

mod config;
mod container;
mod controller;
mod delegate;
mod error;
mod handler;
mod kernel;
mod output;
mod request;
mod response;
mod route;
mod router;
mod server;
mod status;
mod translator;

pub mod middleware;

pub use config::{BodyKeys, Settings, StatusCodes};
pub use container::{Container, Instance, Registry};
pub use controller::{Arguments, Controller, INVOKE};
pub use delegate::{Context, Delegate};
pub use error::{Error, ErrorKind};
pub use handler::{Function, Handler, IntoOutcome, Outcome, Scope, Terminal};
pub use kernel::{Kernel, KernelBuilder, NoTransaction, Transaction};
pub use middleware::Middleware;
pub use middleware::cors::Cors;
pub use output::Output;
pub use request::Request;
pub use response::{ContentKind, Response};
pub use route::{Callback, ComputeParameters, CorsPolicy, Extra, RouteMatch, RouteOptions};
pub use router::{Router, Routes};
pub use server::Server;
pub use status::{StatusType, phrase};
pub use translator::{DefaultTranslator, ErrorTranslator, Translators, error_format};
