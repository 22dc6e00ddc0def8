use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode, Url};

use super::CheckError;

/// Path of the permissions service's "allowed" operation, relative to the
/// configured endpoint.
pub const ALLOW_PATH: &str = "/api/v1/allow";

/// Longest error body kept from a failed check, in characters.
pub const ERROR_BODY_LIMIT: usize = 256;

#[async_trait]
pub trait PermissionsClient: Send + Sync {
    /// Asks whether the caller may perform `action` on `subject`. A definitive
    /// deny is `Ok(false)`, not an error.
    async fn allowed(&self, action: &str, subject: &str) -> Result<bool, CheckError>;
}

/// Builds one client per caller. Clients carry the caller's credential and so
/// are never shared between requests.
pub trait ClientFactory: Send + Sync {
    fn build(
        &self,
        endpoint: &Url,
        token: &str,
        timeout: Duration,
    ) -> Result<Box<dyn PermissionsClient>, CheckError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HttpClientFactory;

impl ClientFactory for HttpClientFactory {
    fn build(
        &self,
        endpoint: &Url,
        token: &str,
        timeout: Duration,
    ) -> Result<Box<dyn PermissionsClient>, CheckError> {
        let client = HttpPermissionsClient::new(endpoint, token, timeout)?;
        Ok(Box::new(client))
    }
}

/// Talks to the permissions service over HTTP. Every request it sends has
/// its `Authorization` header replaced with the caller's token.
#[derive(Debug)]
pub struct HttpPermissionsClient {
    endpoint: Url,
    token: HeaderValue,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpPermissionsClient {
    pub fn new(endpoint: &Url, token: &str, timeout: Duration) -> Result<Self, CheckError> {
        let mut token = HeaderValue::from_str(token).map_err(|_| CheckError::InvalidToken)?;
        token.set_sensitive(true);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(CheckError::Build)?;

        Ok(Self {
            endpoint: endpoint.clone(),
            token,
            timeout,
            client,
        })
    }

    async fn send(&self, mut req: reqwest::Request) -> Result<reqwest::Response, CheckError> {
        req.headers_mut().insert(AUTHORIZATION, self.token.clone());
        self.client.execute(req).await.map_err(|err| {
            if err.is_timeout() {
                CheckError::Timeout(self.timeout)
            } else {
                CheckError::Request(err)
            }
        })
    }
}

#[async_trait]
impl PermissionsClient for HttpPermissionsClient {
    async fn allowed(&self, action: &str, subject: &str) -> Result<bool, CheckError> {
        let url = allow_url(&self.endpoint, action, subject)?;
        let req = reqwest::Request::new(Method::GET, url);
        let resp = self.send(req).await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == StatusCode::FORBIDDEN {
            return Ok(false);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(CheckError::Status {
            status: status.as_u16(),
            body: truncate(body.trim(), ERROR_BODY_LIMIT),
        })
    }
}

fn allow_url(endpoint: &Url, action: &str, subject: &str) -> Result<Url, CheckError> {
    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|_| CheckError::Url(format!("endpoint '{endpoint}' cannot be a base")))?
        .pop_if_empty()
        .extend(ALLOW_PATH.split('/').filter(|s| !s.is_empty()));
    url.query_pairs_mut()
        .clear()
        .append_pair("resource", subject)
        .append_pair("action", action);
    Ok(url)
}

fn truncate(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
