//! Structured log records and the sinks that receive them.
//!
//! Every middleware emits exactly one [`Record`] per invocation that has
//! something to report. Records go to a [`LogSink`] injected when the
//! middleware is built; [`TracingSink`] is the default and forwards to
//! `tracing`, so the subscriber installed by the application decides format
//! and destination.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::Level;

use crate::error::Fields;

/// One structured log entry.
///
/// `fields` is flat: `type`, `request`, `code` and friends all live side by
/// side, and `message` carries the human-readable part.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub level: Level,
    pub message: String,
    pub fields: Fields,
}

impl Record {
    /// Starts a record of the given `type` (`"request"`, `"recovery"`, ...).
    pub fn new(level: Level, kind: &str) -> Self {
        let mut fields = Fields::new();
        fields.insert("type".to_owned(), Value::from(kind));
        Self { level, message: String::new(), fields }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    /// The record's `type` field.
    pub fn kind(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }
}

/// Destination for [`Record`]s.
///
/// One sink is shared by every request a middleware handles, so
/// implementations must tolerate concurrent calls.
pub trait LogSink: Send + Sync + 'static {
    fn emit(&self, record: Record);
}

impl<F> LogSink for F
where
    F: Fn(Record) + Send + Sync + 'static,
{
    fn emit(&self, record: Record) {
        self(record)
    }
}

// ── TracingSink ──────────────────────────────────────────────────────────────

/// Forwards records as `tracing` events under the `seam` target.
///
/// `type` and `request` become event fields of the same name. Anything else
/// is rendered as one JSON object in `fields`, which is left out when empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: Record) {
        let kind = record.kind().unwrap_or_default();
        let request = record.fields.get("request").and_then(Value::as_str);
        let rest: Fields = record
            .fields
            .iter()
            .filter(|(k, _)| *k != "type" && *k != "request")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let rest = (!rest.is_empty()).then(|| Value::Object(rest));
        let message = record.message.as_str();

        macro_rules! event {
            ($level:expr) => {
                tracing::event!(
                    target: "seam",
                    $level,
                    r#type = kind,
                    request,
                    fields = rest.as_ref().map(tracing::field::display),
                    "{message}"
                )
            };
        }

        match record.level {
            Level::ERROR => event!(Level::ERROR),
            Level::WARN => event!(Level::WARN),
            Level::INFO => event!(Level::INFO),
            Level::DEBUG => event!(Level::DEBUG),
            _ => event!(Level::TRACE),
        }
    }
}

// ── MemorySink ───────────────────────────────────────────────────────────────

/// Keeps every record in memory. Clones share the same buffer.
///
/// Meant for tests: hand a clone to the middleware, inspect the original.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Record>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything emitted so far, oldest first.
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: Record) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    }
}
