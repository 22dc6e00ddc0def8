mod client;
mod pipeline;

pub use client::{
    ClientFactory, HttpClientFactory, HttpPermissionsClient, PermissionsClient, ALLOW_PATH,
    ERROR_BODY_LIMIT,
};
pub use pipeline::DecisionPipeline;

use std::time::Duration;

use thiserror::Error;

/// Per-request failures of the decision pipeline. None of them is fatal;
/// all of them are rendered as the same generic error outcome.
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("no valid token found in request")]
    NoValidToken,

    #[error("no valid resource id found in param '{0}'")]
    NoValidResourceID(String),

    #[error("invalid resource uuid '{value}': {reason}")]
    InvalidResourceUUID { value: String, reason: String },

    #[error("no valid tenant found in request")]
    NoValidTenant,

    #[error("error creating authz client: {0}")]
    CreatingAuthzClient(CheckError),

    #[error("error checking permissions: {0}")]
    CheckingPermissions(CheckError),
}

/// Transport level failures talking to the permissions service.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("token is not a valid header value")]
    InvalidToken,

    #[error("build http client: {0}")]
    Build(reqwest::Error),

    #[error("build request url: {0}")]
    Url(String),

    #[error("request: {0}")]
    Request(reqwest::Error),

    #[error("permissions service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
