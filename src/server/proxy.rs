use actix_web::http::header::HeaderValue;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use anyhow::{Context, Result};
use log::{debug, error};
use reqwest::{Method, Url};

use crate::request::{GatewayRequest, RequestView};
use crate::response::HttpResponseError;

/// Headers that only make sense for one connection and are never relayed.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forwards allowed requests to the backend and copies its answer back.
#[derive(Debug, Clone)]
pub struct Relay {
    backend: Url,
    client: reqwest::Client,
}

impl Relay {
    pub fn new(backend: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build relay client")?;
        Ok(Self { backend, client })
    }

    pub async fn forward(&self, req: GatewayRequest) -> HttpResponse {
        match self.send(req).await {
            Ok(resp) => resp,
            Err(err) => {
                error!("Forward request to backend failed: {err:#}");
                HttpResponseError::forward_error().into()
            }
        }
    }

    fn target_url(&self, req: &GatewayRequest) -> Url {
        let mut url = self.backend.clone();
        let path = format!("{}{}", self.backend.path().trim_end_matches('/'), req.path());
        url.set_path(&path);
        url.set_query(req.url().query());
        url
    }

    async fn send(&self, req: GatewayRequest) -> Result<HttpResponse> {
        let url = self.target_url(&req);
        let method = Method::from_bytes(req.method().as_bytes())
            .with_context(|| format!("invalid method '{}'", req.method()))?;
        debug!("Forwarding {method} {url}");

        let mut builder = self.client.request(method, url);
        for (key, values) in req.headers().iter() {
            // Host and length are set again by the relay client
            if skip_header(key)
                || key.eq_ignore_ascii_case("host")
                || key.eq_ignore_ascii_case("content-length")
            {
                continue;
            }
            for value in values {
                builder = builder.header(key.as_str(), value.as_str());
            }
        }

        let resp = builder
            .body(req.into_body())
            .send()
            .await
            .context("send request to backend")?;

        let status = StatusCode::from_u16(resp.status().as_u16())
            .context("backend returned invalid status")?;
        let mut out = HttpResponseBuilder::new(status);
        for (key, value) in resp.headers() {
            if skip_header(key.as_str()) || key.as_str().eq_ignore_ascii_case("content-length") {
                continue;
            }
            let value = match HeaderValue::from_bytes(value.as_bytes()) {
                Ok(value) => value,
                Err(_) => continue,
            };
            out.append_header((key.as_str(), value));
        }

        // Streamed through as it arrives, never buffered whole
        Ok(out.streaming(resp.bytes_stream()))
    }
}

fn skip_header(key: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| key.eq_ignore_ascii_case(h))
}
