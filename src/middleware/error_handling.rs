//! Returned errors → JSON envelope + `error` record.
//!
//! | Error | Status | Envelope | `data` sent |
//! |---|---|---|---|
//! | opaque (not [`Error`]) | 500 | `error`, generic message | no |
//! | [`Error`], code unset or outside 400–599 | 500 | `error` | no |
//! | [`Error`], code 400–499 | code | `fail` | client fields, or `null` |
//! | [`Error`], code 500–599 | code | `error` | no |
//!
//! The log record always carries the full picture: the error's message, its
//! code when non-zero, and client and log-only fields together under `data`.

use std::sync::Arc;

use http::StatusCode;
use tracing::Level;

use crate::correlation;
use crate::envelope::Envelope;
use crate::error::Error;
use crate::handler::{BoxError, BoxFuture, HandlerResult};
use crate::log::{LogSink, Record, TracingSink};
use crate::middleware::{Middleware, Next};
use crate::request::Request;

/// Turns an error returned by an inner stage into a client response.
///
/// Successful results pass through untouched and produce no record. For an
/// error, exactly one record is emitted and exactly one response returned;
/// see the module docs for the mapping.
#[derive(Clone)]
pub struct ErrorHandling {
    sink: Arc<dyn LogSink>,
}

impl ErrorHandling {
    /// Logs through [`TracingSink`].
    pub fn new() -> Self {
        Self { sink: Arc::new(TracingSink) }
    }

    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }
}

impl Default for ErrorHandling {
    fn default() -> Self { Self::new() }
}

impl Middleware for ErrorHandling {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let request_id = correlation::lookup(&req).map(str::to_owned);
        let sink = Arc::clone(&self.sink);

        Box::pin(async move {
            match next.run(req).await {
                Ok(res) => Ok(res),
                Err(err) => respond(&*sink, &err, request_id),
            }
        })
    }
}

fn respond(sink: &dyn LogSink, err: &BoxError, request_id: Option<String>) -> HandlerResult {
    let (record, status, envelope) = classify(err);

    let record = match request_id {
        Some(id) => record.field("request", id),
        None => record,
    };
    sink.emit(record);

    Ok(envelope.into_response(status)?)
}

fn classify(err: &BoxError) -> (Record, StatusCode, Envelope) {
    let record = Record::new(Level::ERROR, "error").message(err.to_string());

    let Some(err) = err.downcast_ref::<Error>() else {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        return (record, status, Envelope::error(generic_message(status)));
    };

    let mut record = record;
    let code = err.code();
    if code != 0 {
        record = record.field("code", code);
    }
    let log_fields = err.log_fields();
    if !log_fields.is_empty() {
        record = record.field("data", log_fields);
    }

    let (status, envelope) = match code {
        400..=499 => (status_for(code), Envelope::fail(err.message(), err.fields())),
        500..=599 => (status_for(code), Envelope::error(err.message())),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, Envelope::error(err.message())),
    };
    (record, status, envelope)
}

/// `code` must already be within 400–599.
fn status_for(code: i32) -> StatusCode {
    u16::try_from(code)
        .ok()
        .and_then(|c| StatusCode::from_u16(c).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn generic_message(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Internal Server Error")
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use bytes::Bytes;
    use serde_json::{Value, json};

    use super::*;
    use crate::log::MemorySink;
    use crate::middleware::Chain;
    use crate::response::Response;

    #[derive(Debug)]
    struct DiskFull;

    impl fmt::Display for DiskFull {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("disk full")
        }
    }

    impl std::error::Error for DiskFull {}

    fn request() -> Request {
        Request::from(http::Request::new(Bytes::new()))
    }

    /// Runs `err` through the middleware; returns status, body and the
    /// single record as JSON.
    async fn handle(err: Option<BoxError>, request_id: Option<&str>) -> (u16, Value, Value) {
        let sink = MemorySink::new();
        let err = std::sync::Mutex::new(err);
        let pipeline = Chain::new()
            .with(ErrorHandling::new().sink(Arc::new(sink.clone())))
            .then(move |_req: Request| {
                let result = match err.lock().unwrap().take() {
                    Some(e) => Err(e),
                    None => Ok(StatusCode::OK),
                };
                async move { result }
            });

        let req = match request_id {
            Some(id) => correlation::attach(request(), id),
            None => request(),
        };
        let res = pipeline.call(req).await.unwrap();

        let body = if res.body().is_empty() {
            json!({})
        } else {
            serde_json::from_slice(res.body()).unwrap()
        };

        let records = sink.records();
        assert!(records.len() <= 1, "more than one record: {records:?}");
        let log = records.first().map_or(json!({}), |r| {
            assert_eq!(r.level, Level::ERROR);
            let mut fields = r.fields.clone();
            fields.insert("msg".into(), Value::from(r.message.clone()));
            Value::Object(fields)
        });

        (res.status_code().as_u16(), body, log)
    }

    #[tokio::test]
    async fn does_nothing_without_an_error() {
        let (status, body, log) = handle(None, Some("requestId")).await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({}));
        assert_eq!(log, json!({}));
    }

    #[tokio::test]
    async fn hides_opaque_errors_from_the_client() {
        let (status, body, log) = handle(Some(Box::new(DiskFull)), None).await;
        assert_eq!(status, 500);
        assert_eq!(body, json!({"status": "error", "message": "Internal Server Error"}));
        assert_eq!(log, json!({"type": "error", "msg": "disk full"}));
    }

    #[tokio::test]
    async fn logs_the_request_id_for_opaque_errors() {
        let (_, _, log) = handle(Some(Box::new(DiskFull)), Some("requestId")).await;
        assert_eq!(log, json!({"type": "error", "request": "requestId", "msg": "disk full"}));
    }

    #[tokio::test]
    async fn omits_code_when_unset() {
        let (status, body, log) = handle(Some(Box::new(Error::new("error"))), None).await;
        assert_eq!(status, 500);
        assert_eq!(body, json!({"status": "error", "message": "error"}));
        assert_eq!(log, json!({"type": "error", "msg": "error"}));
    }

    #[tokio::test]
    async fn answers_500_for_codes_that_are_not_error_statuses() {
        for code in [1, 200, 302, 600, -404] {
            let err = Error::new("boom").with_code(code).with_field("key", "value");
            let (status, body, log) = handle(Some(Box::new(err)), None).await;
            assert_eq!(status, 500, "code {code}");
            assert_eq!(body, json!({"status": "error", "message": "boom"}), "code {code}");
            assert_eq!(log["code"], code, "code {code}");
        }
    }

    #[tokio::test]
    async fn client_errors_fail_with_fields() {
        let err = Error::new("not found").with_code(404).with_field("id", "42");
        let (status, body, log) = handle(Some(Box::new(err)), None).await;
        assert_eq!(status, 404);
        assert_eq!(
            body,
            json!({"status": "fail", "message": "not found", "data": {"id": "42"}})
        );
        assert_eq!(
            log,
            json!({"type": "error", "code": 404, "data": {"id": "42"}, "msg": "not found"})
        );
    }

    #[tokio::test]
    async fn client_errors_without_fields_send_null_data() {
        let (status, body, log) =
            handle(Some(Box::new(Error::new("error").with_code(400))), None).await;
        assert_eq!(status, 400);
        assert_eq!(body, json!({"status": "fail", "message": "error", "data": null}));
        assert_eq!(log, json!({"type": "error", "code": 400, "msg": "error"}));
    }

    #[tokio::test]
    async fn server_errors_never_send_data() {
        let err = Error::new("error")
            .with_code(503)
            .with_field("field", "value")
            .with_log_field("logField", "value");
        let (status, body, log) = handle(Some(Box::new(err)), Some("requestId")).await;
        assert_eq!(status, 503);
        assert_eq!(body, json!({"status": "error", "message": "error"}));
        assert_eq!(
            log,
            json!({
                "type": "error",
                "request": "requestId",
                "code": 503,
                "data": {"field": "value", "logField": "value"},
                "msg": "error",
            })
        );
    }

    #[tokio::test]
    async fn log_only_fields_never_reach_the_body() {
        let err = Error::new("invalid")
            .with_code(422)
            .with_field("field", "value")
            .with_log_field("logField", "secret")
            .with_log_field("field", "log wins");
        let (status, body, log) = handle(Some(Box::new(err)), None).await;
        assert_eq!(status, 422);
        assert_eq!(
            body,
            json!({"status": "fail", "message": "invalid", "data": {"field": "value"}})
        );
        assert_eq!(log["data"], json!({"field": "log wins", "logField": "secret"}));
    }

    #[test]
    fn status_for_maps_in_range_codes() {
        assert_eq!(status_for(404), StatusCode::NOT_FOUND);
        assert_eq!(status_for(599).as_u16(), 599);
        assert_eq!(generic_message(StatusCode::INTERNAL_SERVER_ERROR), "Internal Server Error");
    }

    #[tokio::test]
    async fn handles_errors_returned_through_response_handlers() {
        let sink = MemorySink::new();
        let pipeline = Chain::new()
            .with(ErrorHandling::new().sink(Arc::new(sink.clone())))
            .then(|_req: Request| async {
                Err::<Response, _>(Error::new("gone").with_code(410))
            });

        let res = pipeline.call(request()).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::GONE);
        assert_eq!(res.headers()[http::header::CONTENT_TYPE], "application/json");
        assert_eq!(sink.records().len(), 1);
    }
}
