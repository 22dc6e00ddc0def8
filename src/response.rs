use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::header::MIME_JSON;

pub const NOT_ALLOWED: &str = "not allowed";
pub const REQUEST_ERROR: &str = "error handling request";
pub const FORWARD_ERROR: &str = "error forwarding request";

/// Outcome handed back to the gateway when a request must not go through.
/// Carries nothing about why the pipeline failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct HttpResponseError {
    #[serde(rename = "http_status_code")]
    pub code: u16,

    #[serde(rename = "http_body", default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(rename = "http_encoding")]
    pub encoding: String,
}

impl HttpResponseError {
    /// The permissions service said no.
    pub fn not_allowed() -> Self {
        Self::json(StatusCode::FORBIDDEN, NOT_ALLOWED)
    }

    /// Anything failed before a verdict was reached.
    pub fn request_error() -> Self {
        Self::json(StatusCode::INTERNAL_SERVER_ERROR, REQUEST_ERROR)
    }

    /// The request was allowed but the backend could not be reached.
    pub fn forward_error() -> Self {
        Self::json(StatusCode::INTERNAL_SERVER_ERROR, FORWARD_ERROR)
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn json(status: StatusCode, message: &str) -> Self {
        Self {
            code: status.as_u16(),
            message: message.to_string(),
            encoding: MIME_JSON.to_string(),
        }
    }
}

impl From<HttpResponseError> for HttpResponse {
    fn from(val: HttpResponseError) -> Self {
        let status = val.status();
        HttpResponseBuilder::new(status)
            .content_type(val.encoding.as_str())
            .json(val)
    }
}
