//! Per-request correlation identifiers.
//!
//! An identifier lives in the request's extension map under a key type that
//! only this module can name, so nothing else stored on the request can
//! shadow or overwrite it. Once attached it never changes for the rest of
//! the chain.
//!
//! ```rust
//! use bytes::Bytes;
//! use seam::{correlation, Request};
//!
//! let req = Request::from(http::Request::new(Bytes::new()));
//! assert_eq!(correlation::lookup(&req), None);
//!
//! let req = correlation::attach(req, "abc");
//! assert_eq!(correlation::lookup(&req), Some("abc"));
//!
//! // Already correlated: the first identifier stays.
//! let req = correlation::attach(req, "def");
//! assert_eq!(correlation::lookup(&req), Some("abc"));
//! ```

use std::sync::Arc;

use uuid::Uuid;

use crate::request::Request;

#[derive(Clone)]
struct CorrelationId(Arc<str>);

/// Returns `req` carrying `id`.
///
/// A request that already has an identifier is returned as is.
pub fn attach(mut req: Request, id: impl Into<Arc<str>>) -> Request {
    if req.extensions.get::<CorrelationId>().is_none() {
        req.extensions.insert(CorrelationId(id.into()));
    }
    req
}

/// The identifier attached to `req`, if any.
pub fn lookup(req: &Request) -> Option<&str> {
    req.extensions.get::<CorrelationId>().map(|id| &*id.0)
}

/// Produces correlation identifiers.
///
/// Shared by every request a middleware handles, so implementations must be
/// safe to call concurrently. Any `Fn() -> String + Send + Sync` closure is
/// a generator, which keeps tests deterministic:
///
/// ```rust
/// use std::sync::Arc;
/// use seam::correlation::IdGenerator;
///
/// let ids: Arc<dyn IdGenerator> = Arc::new(|| "fixed".to_owned());
/// assert_eq!(ids.next_id(), "fixed");
/// ```
pub trait IdGenerator: Send + Sync + 'static {
    fn next_id(&self) -> String;
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync + 'static,
{
    fn next_id(&self) -> String {
        self()
    }
}

/// The default generator: random (version 4) UUIDs in hyphenated form.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidV4;

impl IdGenerator for UuidV4 {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
