#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use kiln::{
    Arguments, Controller, ContentKind, Cors, Error, IntoOutcome, Kernel, KernelBuilder, Outcome,
    Output, Registry, Request, Response, RouteMatch, Settings, Transaction,
};
use serde_json::{Value, json};

/// Users controller used across the scenario tests.
pub struct UserController {
    booted_for: Option<String>,
}

impl UserController {
    pub fn new() -> Self {
        Self { booted_for: None }
    }
}

impl Controller for UserController {
    fn boot(&mut self, _request: &Request, response: &mut Response, route: &RouteMatch) {
        self.booted_for = Some(route.path.clone());
        response.header("x-booted", "true");
    }

    fn responds_to(&self, method: &str) -> bool {
        matches!(method, "showProfile" | "crash" | "silent")
    }

    fn parameters(&self, _method: &str) -> &[&str] {
        &["id"]
    }

    fn call(&mut self, method: &str, args: Arguments, out: &mut Output) -> Result<Outcome, Error> {
        match method {
            "showProfile" => {
                out.write(format!("booted for {}", self.booted_for.as_deref().unwrap_or("?")));
                json!({ "id": args.str(0), "name": "alice" }).into_outcome()
            }
            "crash" => Err(anyhow::anyhow!("disk on fire").context("loading profile").into()),
            "silent" => ().into_outcome(),
            other => Err(Error::undefined_method("UserController", other)),
        }
    }
}

pub fn registry() -> Registry {
    Registry::new().controller("UserController", UserController::new)
}

pub fn settings(response_type: ContentKind) -> Settings {
    Settings { response_type, ..Settings::default() }
}

/// Kernel with the users controller and a CORS guard restricted to `origins`.
pub fn kernel(response_type: ContentKind, origins: &[&str]) -> KernelBuilder {
    Kernel::builder(settings(response_type))
        .middleware(Cors::new(origins.iter().copied()))
        .container(registry())
}

pub fn body(res: &Response) -> Value {
    serde_json::from_slice(res.body()).expect("body is JSON")
}

/// Counts commits; fails them when `fail` is set.
pub struct CountingTransaction {
    pub commits: &'static AtomicUsize,
    pub fail: bool,
}

impl Transaction for CountingTransaction {
    fn commit(&self) -> Result<(), Error> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Commit("connection reset during commit".into()));
        }
        Ok(())
    }
}
