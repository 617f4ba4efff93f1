//! Panic containment.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use http::StatusCode;
use tracing::Level;

use crate::correlation;
use crate::handler::BoxFuture;
use crate::log::{LogSink, Record, TracingSink};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Stops a panic in any inner stage from escaping the chain.
///
/// On panic this stage logs one `recovery` record at error level, carrying
/// the panic message and the correlation identifier when one is attached,
/// and answers with an empty `500 Internal Server Error`. The caller gets
/// `Ok`: the panic is neither re-raised nor turned into an error value.
///
/// Without a panic the inner result is returned as is and nothing is logged.
///
/// A panic payload is reported verbatim when it is a `&str` or `String`
/// (which covers `panic!` with a message) and as `"panic"` otherwise.
#[derive(Clone)]
pub struct Recovery {
    sink: Arc<dyn LogSink>,
}

impl Recovery {
    /// Logs through [`TracingSink`].
    pub fn new() -> Self {
        Self { sink: Arc::new(TracingSink) }
    }

    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }
}

impl Default for Recovery {
    fn default() -> Self { Self::new() }
}

impl Middleware for Recovery {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let request_id = correlation::lookup(&req).map(str::to_owned);
        let sink = Arc::clone(&self.sink);

        // `next.run` must happen inside the guarded future: a handler may panic
        // while building its future, before the first poll.
        let guarded = AssertUnwindSafe(async move { next.run(req).await }).catch_unwind();

        Box::pin(async move {
            match guarded.await {
                Ok(result) => result,
                Err(payload) => {
                    let mut record =
                        Record::new(Level::ERROR, "recovery").message(panic_message(&*payload));
                    if let Some(id) = request_id {
                        record = record.field("request", id);
                    }
                    sink.emit(record);
                    Ok(Response::status(StatusCode::INTERNAL_SERVER_ERROR))
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_owned()
    }
}
