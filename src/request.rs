use std::collections::HashMap;

use actix_web::web::Bytes;
use actix_web::HttpRequest;
use anyhow::{Context, Result};
use log::debug;
use reqwest::Url;

use crate::header::{canonical_param, HeaderMap};

/// Read-only view over an inbound request.
///
/// The decision pipeline only ever reads through this trait, so any gateway
/// request type can be plugged in by implementing it.
pub trait RequestView: Send + Sync {
    /// All request headers, keyed in canonical form.
    fn headers(&self) -> &HeaderMap;

    /// Route and query parameters. Keys have their first character upper-cased.
    fn params(&self) -> &HashMap<String, String>;

    fn path(&self) -> &str;

    fn query(&self) -> &HashMap<String, Vec<String>>;

    fn method(&self) -> &str;

    fn url(&self) -> &Url;

    fn body(&self) -> &[u8];

    /// Returns the first value of the header, or an empty string.
    fn header(&self, name: &str) -> &str {
        self.headers().get(name)
    }
}

/// An owned inbound request, as seen by the gateway.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    method: String,
    url: Url,
    headers: HeaderMap,
    params: HashMap<String, String>,
    query: HashMap<String, Vec<String>>,
    body: Bytes,
}

impl GatewayRequest {
    pub fn builder(method: &str, url: Url) -> GatewayRequestBuilder {
        GatewayRequestBuilder {
            method: method.to_uppercase(),
            url,
            headers: HeaderMap::new(),
            route_params: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Builds the request view from an actix request. `base` is the scheme and
    /// authority the gateway is reachable on; actix only knows the path part.
    pub fn from_actix(req: &HttpRequest, body: Bytes, base: &Url) -> Result<Self> {
        let url = base
            .join(&req.uri().to_string())
            .with_context(|| format!("build request url from '{}'", req.uri()))?;

        let mut builder = Self::builder(req.method().as_str(), url).body(body);
        for (key, value) in req.headers() {
            let value = match value.to_str() {
                Ok(value) => value,
                Err(_) => {
                    debug!(
                        "Drop header '{key}' of {} {}: value is not valid UTF-8",
                        req.method(),
                        req.path()
                    );
                    continue;
                }
            };
            builder = builder.header(key.as_str(), value);
        }
        for (key, value) in req.match_info().iter() {
            builder = builder.param(key, value);
        }

        Ok(builder.build())
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

impl RequestView for GatewayRequest {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    fn path(&self) -> &str {
        self.url.path()
    }

    fn query(&self) -> &HashMap<String, Vec<String>> {
        &self.query
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn url(&self) -> &Url {
        &self.url
    }

    fn body(&self) -> &[u8] {
        &self.body
    }
}

pub struct GatewayRequestBuilder {
    method: String,
    url: Url,
    headers: HeaderMap,
    route_params: Vec<(String, String)>,
    body: Bytes,
}

impl GatewayRequestBuilder {
    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }

    /// Adds a route parameter. Route parameters win over query parameters of
    /// the same name.
    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.route_params.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> GatewayRequest {
        let mut query: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in self.url.query_pairs() {
            query
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }

        let mut params = HashMap::new();
        for (key, values) in query.iter() {
            if let Some(value) = values.first() {
                params.insert(canonical_param(key), value.clone());
            }
        }
        for (key, value) in self.route_params {
            params.insert(canonical_param(&key), value);
        }

        GatewayRequest {
            method: self.method,
            url: self.url,
            headers: self.headers,
            params,
            query,
            body: self.body,
        }
    }
}
