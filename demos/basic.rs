//! Minimal kiln app: a controller, a closure route, and the CORS guard.
//!
//! Run with:
//!   RUST_LOG=debug KILN_CORS_ORIGINS=https://app.example.com cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42/show-profile
//!   curl http://localhost:3000/users/42/delete           # 501, no such action
//!   curl http://localhost:3000/hello/ana
//!   curl http://localhost:3000/nowhere                   # 501, no route
//!   curl -X OPTIONS http://localhost:3000/users/42/show-profile \
//!        -H 'origin: https://app.example.com' \
//!        -H 'access-control-request-method: GET'
//!   curl -X OPTIONS http://localhost:3000/users/42/show-profile \
//!        -H 'origin: https://evil.example' \
//!        -H 'access-control-request-method: GET'        # 403

use http::Method;
use kiln::{
    Arguments, Controller, Cors, Error, Function, IntoOutcome, Kernel, Outcome, Output, Registry,
    Request, Response, RouteMatch, RouteOptions, Router, Scope, Server, Settings,
};
use serde_json::json;

struct Users {
    viewer: Option<String>,
}

impl Controller for Users {
    fn boot(&mut self, request: &Request, response: &mut Response, _route: &RouteMatch) {
        self.viewer = request.header("x-viewer").map(str::to_owned);
        response.header("cache-control", "no-store");
    }

    fn responds_to(&self, method: &str) -> bool {
        method == "showProfile"
    }

    fn parameters(&self, _method: &str) -> &[&str] {
        &["id"]
    }

    fn call(&mut self, method: &str, args: Arguments, out: &mut Output) -> Result<Outcome, Error> {
        match method {
            "showProfile" => {
                out.write(format!("profile requested by {:?}", self.viewer));
                json!({ "id": args.str(0), "name": "alice" }).into_outcome()
            }
            other => Err(Error::undefined_method("Users", other)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let kernel = Kernel::builder(Settings::from_env())
        .middleware(Cors::from_env())
        .container(Registry::new().controller("Users", || Users { viewer: None }))
        .build()?;

    let cors = RouteOptions { pipe: Some(vec!["cors".into()]), ..RouteOptions::default() };
    let hello = Function::new(|scope: &mut Scope<'_>, args: Arguments| {
        scope.write("greeting");
        format!("hello {}", args.str(0).unwrap_or("stranger"))
    })
    .with_parameters(["name"]);

    let routes = Router::new()
        .route(Method::GET, "/users/{id}/show-profile", "Users", cors.clone())
        .route(Method::GET, "/users/{id}/delete", "Users", cors)
        .on(Method::GET, "/hello/{name}", hello);

    Server::bind("0.0.0.0:3000").serve(kernel, routes).await
}
