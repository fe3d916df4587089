//! HTTP transport and graceful shutdown.
//!
//! The kernel is synchronous, so each request is looked up on the connection
//! task and then handed to tokio's blocking pool for the pipeline run. The
//! envelope comes back and is emitted through hyper.
//!
//! # Shutdown
//!
//! On SIGTERM or Ctrl-C the server
//! 1. stops accepting connections,
//! 2. lets every in-flight connection finish,
//! 3. returns from [`Server::serve`].

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::kernel::Kernel;
use crate::request::Request;
use crate::response::Response;
use crate::router::Routes;

enum Bind {
    Addr(SocketAddr),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    bind: Bind,
}

impl Server {
    /// A server that binds `addr` when [`serve`](Server::serve) is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// ```rust,no_run
    /// let server = kiln::Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr = addr.parse::<SocketAddr>().unwrap_or_else(|e| panic!("invalid socket address `{addr}`: {e}"));
        Self { bind: Bind::Addr(addr) }
    }

    /// A server on an already bound listener.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { bind: Bind::Listener(listener) }
    }

    /// Serves until SIGTERM or Ctrl-C, then drains in-flight connections.
    pub async fn serve(self, kernel: Kernel, routes: impl Routes + 'static) -> Result<(), Error> {
        self.serve_with_shutdown(kernel, routes, shutdown_signal()).await
    }

    /// Serves until `shutdown` resolves, then drains in-flight connections.
    pub async fn serve_with_shutdown(
        self,
        kernel: Kernel,
        routes: impl Routes + 'static,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = match self.bind {
            Bind::Addr(addr) => TcpListener::bind(addr).await?,
            Bind::Listener(listener) => listener,
        };
        let kernel = Arc::new(kernel);
        let routes: Arc<dyn Routes> = Arc::new(routes);

        info!(addr = %listener.local_addr()?, "kiln listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown requested, draining connections");
                    break;
                }

                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let kernel = Arc::clone(&kernel);
                    let routes = Arc::clone(&routes);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            dispatch(Arc::clone(&kernel), Arc::clone(&routes), req)
                        });
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new()).serve_connection(io, svc).await {
                            error!(%peer, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("kiln stopped");
        Ok(())
    }
}

const REQUEST_METHOD: &str = "access-control-request-method";

/// One request: read the body, look the route up, run the kernel off the
/// async workers, emit.
async fn dispatch(
    kernel: Arc<Kernel>,
    routes: Arc<dyn Routes>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes().to_vec(),
        Err(e) => {
            warn!("could not read request body: {e}");
            return Ok(bare(400));
        }
    };
    let request = Request::from_parts(&parts, body);

    // A preflight is routed as the request it announces.
    let method = request
        .header(REQUEST_METHOD)
        .and_then(|m| m.trim().to_ascii_uppercase().parse::<Method>().ok())
        .unwrap_or_else(|| request.method().clone());
    let route = routes.lookup(&method, request.uri());
    debug!(%method, uri = %request.uri(), path = %route.path, "routed");

    match tokio::task::spawn_blocking(move || kernel.handle(request, &route)).await {
        Ok(response) => Ok(response.into_http()),
        Err(e) => {
            error!("request task failed: {e}");
            Ok(bare(500))
        }
    }
}

fn bare(status: u16) -> http::Response<Full<Bytes>> {
    let mut res = Response::new();
    res.set_status(status);
    res.into_http()
}

/// Resolves on SIGTERM or Ctrl-C, whichever comes first.
///
/// A signal that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
}
