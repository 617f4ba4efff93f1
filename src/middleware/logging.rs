//! Per-request access log.

use std::sync::Arc;
use std::time::Instant;

use tracing::Level;

use crate::correlation::{self, IdGenerator, UuidV4};
use crate::handler::BoxFuture;
use crate::log::{LogSink, Record, TracingSink};
use crate::middleware::{Middleware, Next};
use crate::request::Request;

/// Emits one `request` record for every request, after the rest of the chain
/// has produced its result.
///
/// This stage owns correlation: it attaches a fresh identifier from its
/// [`IdGenerator`] unless an earlier stage already attached one, and the
/// identifier stays on the request for every stage further in.
///
/// Record fields: `type`, `request`, `host`, `method`, `path`, `code`,
/// `duration`, `written`. When the inner stages return an error instead of a
/// response, `code` is 500 and `written` is 0, which is what the server
/// answers for an error nobody handled. The result itself is returned
/// untouched.
#[derive(Clone)]
pub struct RequestLogging {
    sink: Arc<dyn LogSink>,
    ids: Arc<dyn IdGenerator>,
}

impl RequestLogging {
    /// Logs through [`TracingSink`] and generates [`UuidV4`] identifiers.
    pub fn new() -> Self {
        Self { sink: Arc::new(TracingSink), ids: Arc::new(UuidV4) }
    }

    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }
}

impl Default for RequestLogging {
    fn default() -> Self { Self::new() }
}

impl Middleware for RequestLogging {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let host = req.host().unwrap_or_default().to_owned();
        let method = req.method().to_string();
        let path = req.path_and_query().to_owned();

        let id = match correlation::lookup(&req) {
            Some(id) => id.to_owned(),
            None => self.ids.next_id(),
        };
        let req = correlation::attach(req, id.as_str());
        let sink = Arc::clone(&self.sink);

        Box::pin(async move {
            let start = Instant::now();
            let result = next.run(req).await;
            let elapsed = start.elapsed();

            let (code, written) = match &result {
                Ok(res) => (res.status_code().as_u16(), res.written()),
                Err(_) => (500, 0),
            };

            sink.emit(
                Record::new(Level::INFO, "request")
                    .field("request", id)
                    .field("host", host)
                    .field("method", method)
                    .field("path", path)
                    .field("code", code)
                    .field("duration", format!("{elapsed:?}"))
                    .field("written", written),
            );

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use http::{Method, StatusCode};
    use serde_json::{Value, json};

    use super::*;
    use crate::error::Error;
    use crate::log::MemorySink;
    use crate::middleware::Chain;
    use crate::response::Response;

    fn request(method: Method, uri: &str) -> Request {
        Request::from(
            http::Request::builder()
                .method(method)
                .uri(uri)
                .header("host", "example.com")
                .body(Bytes::new())
                .unwrap(),
        )
    }

    fn logging(sink: &MemorySink) -> RequestLogging {
        RequestLogging::new()
            .sink(Arc::new(sink.clone()))
            .ids(Arc::new(|| "requestId".to_owned()))
    }

    fn only_record(sink: &MemorySink) -> Record {
        let mut records = sink.records();
        assert_eq!(records.len(), 1, "expected exactly one record: {records:?}");
        records.remove(0)
    }

    fn assert_fields(record: &Record, expected: Value) {
        for (k, v) in expected.as_object().unwrap() {
            assert_eq!(record.fields.get(k), Some(v), "field `{k}`");
        }
    }

    #[tokio::test]
    async fn passes_errors_through_and_logs_500() {
        let sink = MemorySink::new();
        let pipeline = Chain::new()
            .with(logging(&sink))
            .then(|_req: Request| async { Err::<Response, _>(Error::new("error").with_code(409)) });

        let err = pipeline.call(request(Method::GET, "/path")).await.unwrap_err();
        let err = err.downcast_ref::<Error>().unwrap();
        assert_eq!(err.message(), "error");
        assert_eq!(err.code(), 409);

        let record = only_record(&sink);
        assert_eq!(record.level, Level::INFO);
        assert_fields(
            &record,
            json!({
                "type": "request",
                "request": "requestId",
                "host": "example.com",
                "method": "GET",
                "path": "/path",
                "code": 500,
                "written": 0,
            }),
        );
    }

    #[tokio::test]
    async fn logs_status_method_and_query() {
        let sink = MemorySink::new();
        let pipeline = Chain::new().with(logging(&sink)).then(|_req: Request| async {
            Ok::<_, Error>(Response::builder().status(StatusCode::MOVED_PERMANENTLY).no_body())
        });

        pipeline.call(request(Method::POST, "/path?page=2")).await.unwrap();

        assert_fields(
            &only_record(&sink),
            json!({"method": "POST", "path": "/path?page=2", "code": 301}),
        );
    }

    #[tokio::test]
    async fn logs_bytes_written_and_duration() {
        let sink = MemorySink::new();
        let pipeline = Chain::new()
            .with(logging(&sink))
            .then(|_req: Request| async { Ok::<_, Error>("data") });

        pipeline.call(request(Method::GET, "/path")).await.unwrap();

        let record = only_record(&sink);
        assert_fields(&record, json!({"code": 200, "written": 4}));
        assert!(record.fields["duration"].as_str().is_some_and(|d| !d.is_empty()));
    }

    #[tokio::test]
    async fn attaches_the_identifier_it_logs() {
        let sink = MemorySink::new();
        let pipeline = Chain::new().with(logging(&sink)).then(|req: Request| async move {
            Ok::<_, Error>(correlation::lookup(&req).unwrap_or("missing").to_owned())
        });

        let res = pipeline.call(request(Method::GET, "/")).await.unwrap();
        assert_eq!(&res.body()[..], b"requestId");
        assert_fields(&only_record(&sink), json!({"request": "requestId"}));
    }

    #[tokio::test]
    async fn reuses_an_identifier_attached_earlier() {
        let sink = MemorySink::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let pipeline = Chain::new()
            .with(logging(&sink).ids(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                "fresh".to_owned()
            })))
            .then(|_req: Request| async { Ok::<_, Error>(StatusCode::NO_CONTENT) });

        let req = correlation::attach(request(Method::GET, "/"), "upstream");
        pipeline.call(req).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_fields(&only_record(&sink), json!({"request": "upstream"}));
    }

    #[tokio::test]
    async fn default_generator_gives_each_request_its_own_id() {
        let sink = MemorySink::new();
        let pipeline = Chain::new()
            .with(RequestLogging::new().sink(Arc::new(sink.clone())))
            .then(|_req: Request| async { Ok::<_, Error>(StatusCode::NO_CONTENT) });

        pipeline.call(request(Method::GET, "/")).await.unwrap();
        pipeline.call(request(Method::GET, "/")).await.unwrap();

        let ids: Vec<_> = sink.records().iter().map(|r| r.fields["request"].clone()).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }
}
