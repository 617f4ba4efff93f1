//! Correlation without logging.

use std::sync::Arc;

use crate::correlation::{self, IdGenerator, UuidV4};
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;

/// Attaches a correlation identifier and does nothing else.
///
/// Put it in front of stages that need an identifier before
/// [`RequestLogging`](crate::middleware::RequestLogging) runs, or in chains
/// that have no access log at all. A request that already carries an
/// identifier keeps it.
#[derive(Clone)]
pub struct RequestTracking {
    ids: Arc<dyn IdGenerator>,
}

impl RequestTracking {
    /// Generates [`UuidV4`] identifiers.
    pub fn new() -> Self {
        Self { ids: Arc::new(UuidV4) }
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }
}

impl Default for RequestTracking {
    fn default() -> Self { Self::new() }
}

impl Middleware for RequestTracking {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let req = match correlation::lookup(&req) {
            Some(_) => req,
            None => correlation::attach(req, self.ids.next_id()),
        };
        next.run(req)
    }
}
