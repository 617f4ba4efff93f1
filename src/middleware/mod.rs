//! Middleware layer.
//!
//! Middleware intercepts a request on its way to the handler and the result
//! on its way back. Built-in stages:
//!
//! | Stage | Record type | Job |
//! |---|---|---|
//! | [`RequestLogging`] | `request` | correlation id, status, duration, bytes written |
//! | [`Recovery`] | `recovery` | turns a panic into an empty 500 |
//! | [`ErrorHandling`] | `error` | turns a returned error into a JSON envelope |
//! | [`RequestTracking`] | | attaches a correlation id without logging |
//!
//! Stages are composed with a [`Chain`]. The first stage added is the
//! outermost one:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use seam::correlation::UuidV4;
//! use seam::log::TracingSink;
//! use seam::middleware::{Chain, ErrorHandling, Recovery, RequestLogging};
//! use seam::{Error, Request, Response, Router, Server};
//!
//! async fn get_user(req: Request) -> Result<Response, Error> {
//!     match req.param("id") {
//!         Some("42") => Ok(Response::json(r#"{"id":"42"}"#)),
//!         Some(id) => Err(Error::new("user not found").with_code(404).with_field("id", id)),
//!         None => Err(Error::new("missing id").with_code(400)),
//!     }
//! }
//!
//! # async fn run() -> Result<(), seam::ServeError> {
//! let app = Chain::new()
//!     .with(RequestLogging::new().sink(Arc::new(TracingSink)).ids(Arc::new(UuidV4)))
//!     .with(Recovery::new())
//!     .with(ErrorHandling::new())
//!     .route(Router::new().get("/users/{id}", get_user));
//!
//! Server::bind(([0, 0, 0, 0], 3000)).serve(app).await
//! # }
//! ```

mod error_handling;
mod logging;
mod recovery;
mod tracking;

use std::sync::Arc;

use crate::correlation::IdGenerator;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::log::LogSink;
use crate::request::Request;
use crate::router::Router;

pub use error_handling::ErrorHandling;
pub use logging::RequestLogging;
pub use recovery::Recovery;
pub use tracking::RequestTracking;

/// A stage of the request pipeline.
///
/// `handle` receives the request and the rest of the chain. It may inspect
/// or replace the request, call `next.run(req)` zero or one time, and
/// inspect or replace the result.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: Request, next: Next) -> BoxFuture;
}

/// The remainder of the chain after the current stage.
#[derive(Clone)]
pub struct Next {
    inner: BoxedHandler,
}

impl Next {
    pub fn run(self, req: Request) -> BoxFuture {
        self.inner.call(req)
    }
}

/// One middleware stage bound to the stage that follows it.
struct Layered {
    middleware: Arc<dyn Middleware>,
    next: Next,
}

impl ErasedHandler for Layered {
    fn call(&self, req: Request) -> BoxFuture {
        self.middleware.handle(req, self.next.clone())
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// An ordered list of middleware, outermost first.
#[derive(Clone, Default)]
pub struct Chain {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logging, then recovery, then error handling, all reporting to `sink`.
    pub fn standard(sink: Arc<dyn LogSink>, ids: Arc<dyn IdGenerator>) -> Self {
        Self::new()
            .with(RequestLogging::new().sink(Arc::clone(&sink)).ids(ids))
            .with(Recovery::new().sink(Arc::clone(&sink)))
            .with(ErrorHandling::new().sink(sink))
    }

    /// Appends a stage inside every stage added so far.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Terminates the chain with a single handler.
    pub fn then(self, handler: impl Handler) -> Pipeline {
        self.finish(handler.into_boxed_handler())
    }

    /// Terminates the chain with a router.
    pub fn route(self, router: Router) -> Pipeline {
        self.finish(Arc::new(router))
    }

    fn finish(self, endpoint: BoxedHandler) -> Pipeline {
        let inner = self.stages.into_iter().rev().fold(endpoint, |next, middleware| {
            Arc::new(Layered { middleware, next: Next { inner: next } }) as BoxedHandler
        });
        Pipeline { inner }
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// A fully composed chain, ready to serve requests.
///
/// Cloning is one atomic increment; every clone runs the same stages.
#[derive(Clone)]
pub struct Pipeline {
    inner: BoxedHandler,
}

impl Pipeline {
    pub fn call(&self, req: Request) -> BoxFuture {
        self.inner.call(req)
    }
}

impl From<Router> for Pipeline {
    fn from(router: Router) -> Self {
        Chain::new().route(router)
    }
}
