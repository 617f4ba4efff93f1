//! Error types.
//!
//! [`Error`] is the application error a handler returns when it wants to
//! shape the response the client sees. It carries two independent field
//! sets: one that may be sent to the client, and one that only ever reaches
//! the log. [`ErrorHandling`](crate::middleware::ErrorHandling) turns it into
//! a JSON envelope and a log record.
//!
//! [`ServeError`] surfaces infrastructure failures from the server itself.

use std::fmt;

use serde_json::{Map, Value};

/// Structured error detail, keyed by field name.
pub type Fields = Map<String, Value>;

/// An application error with an optional status code and structured fields.
///
/// ```rust
/// use seam::Error;
///
/// let err = Error::new("not found")
///     .with_code(404)
///     .with_field("id", "42")
///     .with_log_field("table", "users");
///
/// assert_eq!(err.code(), 404);
/// assert!(err.fields().contains_key("id"));
/// assert!(!err.fields().contains_key("table"));
/// assert!(err.log_fields().contains_key("table"));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Error {
    message: String,
    code: i32,
    fields: Fields,
    log_fields: Fields,
}

impl Error {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Self::default() }
    }

    /// Sets the code, replacing any previous one.
    ///
    /// Only codes in `400..600` change the response status; anything else is
    /// still logged but answered with a 500.
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    /// Adds a client-visible field. Blank keys are ignored.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        insert(&mut self.fields, key.into(), value.into());
        self
    }

    /// Adds each pair as if by [`with_field`](Error::with_field).
    pub fn with_fields<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (k, v) in fields {
            insert(&mut self.fields, k.into(), v.into());
        }
        self
    }

    /// Adds a log-only field. Blank keys are ignored.
    pub fn with_log_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        insert(&mut self.log_fields, key.into(), value.into());
        self
    }

    /// Adds each pair as if by [`with_log_field`](Error::with_log_field).
    pub fn with_log_fields<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (k, v) in fields {
            insert(&mut self.log_fields, k.into(), v.into());
        }
        self
    }

    pub fn message(&self) -> &str { &self.message }

    /// The code set with [`with_code`](Error::with_code), or `0` when unset.
    pub fn code(&self) -> i32 { self.code }

    /// Fields that may be sent to the client. Never contains log-only keys.
    pub fn fields(&self) -> &Fields { &self.fields }

    /// Every field, client-visible and log-only. Log-only values win when a
    /// key exists in both sets.
    ///
    /// The map is built on each call and owned by the caller.
    pub fn log_fields(&self) -> Fields {
        let mut all = self.fields.clone();
        all.extend(self.log_fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        all
    }
}

fn insert(fields: &mut Fields, key: String, value: Value) {
    if key.trim().is_empty() {
        return;
    }
    fields.insert(key, value);
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Error {}

/// The error type returned by [`Server::serve`](crate::Server::serve).
///
/// Application-level failures never show up here: they are turned into
/// responses by the middleware chain. This type surfaces binding to a port
/// or accepting a connection.
#[derive(Debug)]
pub struct ServeError(std::io::Error);

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "io: {}", self.0)
    }
}

impl std::error::Error for ServeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<std::io::Error> for ServeError {
    fn from(e: std::io::Error) -> Self {
        Self(e)
    }
}
