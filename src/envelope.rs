//! JSON response envelope for failed requests.
//!
//! Two shapes are ever written:
//!
//! ```text
//! {"status":"fail","message":"not found","data":{"id":"42"}}   4xx, data may be null
//! {"status":"error","message":"Internal Server Error"}         5xx, never any data
//! ```

use http::StatusCode;
use serde::Serialize;

use crate::error::Fields;
use crate::response::Response;

#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub(crate) enum Envelope {
    /// The client got something wrong. `data` is always serialized, as `null`
    /// when there is nothing to say.
    Fail { message: String, data: Option<Fields> },
    /// The server failed. Structured data is never sent.
    Error { message: String },
}

impl Envelope {
    /// The envelope for a `fail` response; an empty field set becomes `null`.
    pub(crate) fn fail(message: impl Into<String>, fields: &Fields) -> Self {
        let data = (!fields.is_empty()).then(|| fields.clone());
        Self::Fail { message: message.into(), data }
    }

    pub(crate) fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }

    pub(crate) fn into_response(self, status: StatusCode) -> Result<Response, serde_json::Error> {
        let body = serde_json::to_vec(&self)?;
        Ok(Response::builder().status(status).json(body))
    }
}
