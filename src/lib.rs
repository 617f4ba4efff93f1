//! # seam
//!
//! The stretch of an HTTP service between the server and the business
//! handler, done once.
//!
//! - **Correlation**: every request gets an identifier, attached once and
//!   carried through the chain in the request itself ([`correlation`]).
//! - **Request logging**: one structured record per request with status,
//!   duration and bytes written ([`middleware::RequestLogging`]).
//! - **Panic recovery**: a panicking handler becomes an empty 500 and a
//!   `recovery` record, never a dropped connection ([`middleware::Recovery`]).
//! - **Error envelopes**: handlers return an [`Error`] carrying a code and
//!   two field sets, one for the client and one for the log only;
//!   [`middleware::ErrorHandling`] turns it into a JSON envelope and an
//!   `error` record.
//!
//! Log records go to an injected [`log::LogSink`]; the default forwards to
//! `tracing`. Identifiers come from an injected
//! [`correlation::IdGenerator`]. Neither is global.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use seam::correlation::UuidV4;
//! use seam::log::TracingSink;
//! use seam::middleware::Chain;
//! use seam::{Error, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), seam::ServeError> {
//!     let app = Chain::standard(Arc::new(TracingSink), Arc::new(UuidV4))
//!         .route(Router::new().get("/users/{id}", get_user));
//!
//!     Server::bind(([0, 0, 0, 0], 3000)).serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Result<Response, Error> {
//!     let id = req.param("id").unwrap_or_default();
//!     if id != "42" {
//!         // {"status":"fail","message":"user not found","data":{"id":"7"}}
//!         return Err(Error::new("user not found")
//!             .with_code(404)
//!             .with_field("id", id)
//!             .with_log_field("lookup", "users.by_id"));
//!     }
//!     Ok(Response::json(r#"{"id":"42","name":"alice"}"#))
//! }
//! ```

mod envelope;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod correlation;
pub mod log;
pub mod middleware;

pub use error::{Error, Fields, ServeError};
pub use handler::{BoxError, BoxFuture, Handler, HandlerResult};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
