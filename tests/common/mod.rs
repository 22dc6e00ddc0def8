#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::web::{self, Bytes, Data};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;

pub const ALLOW_TOKEN: &str = "Bearer allow";
pub const DENY_TOKEN: &str = "Bearer deny";
pub const SLOW_TOKEN: &str = "Bearer slow";
pub const BROKEN_TOKEN: &str = "Bearer broken";

pub const BROKEN_BODY: &str = "policy store unavailable";

#[derive(Debug, Clone, PartialEq)]
pub struct AllowCall {
    pub token: String,
    pub resource: String,
    pub action: String,
}

pub type Calls<T> = Arc<Mutex<Vec<T>>>;

#[derive(Deserialize)]
struct AllowQuery {
    resource: String,
    action: String,
}

/// A permissions service whose verdict depends only on the token.
pub struct StubAuthz {
    pub url: Url,
    calls: Calls<AllowCall>,
}

impl StubAuthz {
    pub async fn start() -> Self {
        let calls: Calls<AllowCall> = Arc::default();
        let data = calls.clone();
        let srv = HttpServer::new(move || {
            App::new()
                .app_data(Data::new(data.clone()))
                .route("/api/v1/allow", web::get().to(allow))
        })
        .workers(2)
        .bind(("127.0.0.1", 0))
        .unwrap();

        let addr = srv.addrs()[0];
        actix_web::rt::spawn(srv.run());

        Self {
            url: Url::parse(&format!("http://{addr}")).unwrap(),
            calls,
        }
    }

    pub fn calls(&self) -> Vec<AllowCall> {
        self.calls.lock().unwrap().clone()
    }
}

async fn allow(
    req: HttpRequest,
    query: web::Query<AllowQuery>,
    calls: Data<Calls<AllowCall>>,
) -> HttpResponse {
    let token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    calls.lock().unwrap().push(AllowCall {
        token: token.clone(),
        resource: query.resource.clone(),
        action: query.action.clone(),
    });

    match token.as_str() {
        ALLOW_TOKEN => HttpResponse::Ok().json(json!({})),
        DENY_TOKEN => HttpResponse::Forbidden().finish(),
        SLOW_TOKEN => {
            actix_web::rt::time::sleep(Duration::from_secs(3)).await;
            HttpResponse::Ok().finish()
        }
        _ => HttpResponse::InternalServerError().body(BROKEN_BODY),
    }
}

#[derive(Debug, Clone)]
pub struct BackendCall {
    pub method: String,
    pub path: String,
    pub query: String,
    pub authorization: String,
    pub body: String,
}

/// A backend that records every request and answers 201 with a marker header.
pub struct StubBackend {
    pub url: Url,
    calls: Calls<BackendCall>,
}

impl StubBackend {
    pub async fn start() -> Self {
        let calls: Calls<BackendCall> = Arc::default();
        let data = calls.clone();
        let srv = HttpServer::new(move || {
            App::new()
                .app_data(Data::new(data.clone()))
                .default_service(web::route().to(echo))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();

        let addr = srv.addrs()[0];
        actix_web::rt::spawn(srv.run());

        Self {
            url: Url::parse(&format!("http://{addr}")).unwrap(),
            calls,
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }
}

async fn echo(req: HttpRequest, body: Bytes, calls: Data<Calls<BackendCall>>) -> HttpResponse {
    let call = BackendCall {
        method: req.method().to_string(),
        path: req.path().to_string(),
        query: req.query_string().to_string(),
        authorization: req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        body: String::from_utf8_lossy(&body).to_string(),
    };
    calls.lock().unwrap().push(call);

    HttpResponse::Created()
        .insert_header(("X-Backend", "stub"))
        .body("created")
}
