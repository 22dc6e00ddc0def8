use std::sync::Arc;
use std::time::Duration;

use actix_web::body::BoxBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::web::{self, Bytes, Data, PayloadConfig};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use log::{error, info, warn};
use reqwest::Url;
use sd_notify::NotifyState;
use serde_json::json;

use crate::request::GatewayRequest;
use crate::response::HttpResponseError;

use super::gatekeeper::Gatekeeper;
use super::proxy::Relay;

pub struct RestfulServer {
    ctx: Arc<RestfulContext>,

    keep_alive_secs: Option<u64>,
    workers: Option<u64>,

    bind: String,
}

pub struct RestfulContext {
    pub gatekeeper: Arc<Gatekeeper>,
    pub relay: Relay,

    /// Route patterns whose placeholders become request params.
    pub routes: Vec<String>,

    pub payload_limit_mib: usize,
}

impl RestfulServer {
    const HEALTHZ_PATH: &str = "/healthz";

    pub fn new(bind: String, ctx: Arc<RestfulContext>) -> Self {
        Self {
            ctx,
            keep_alive_secs: None,
            workers: None,
            bind,
        }
    }

    pub fn set_keep_alive_secs(&mut self, keep_alive_secs: u64) {
        self.keep_alive_secs = Some(keep_alive_secs);
    }

    pub fn set_workers(&mut self, workers: u64) {
        self.workers = Some(workers);
    }

    pub async fn run(self) -> Result<()> {
        let ctx = self.ctx.clone();
        let mut srv = HttpServer::new(move || Self::build_app(ctx.clone()));
        if let Some(keep_alive) = self.keep_alive_secs {
            srv = srv.keep_alive(Duration::from_secs(keep_alive));
        }
        if let Some(workers) = self.workers {
            srv = srv.workers(workers as usize);
        }

        let srv = srv
            .bind(&self.bind)
            .with_context(|| format!("bind gateway to '{}'", self.bind))?;
        for addr in srv.addrs() {
            info!("Gateway listening on http://{addr}");
        }
        if self.ctx.routes.is_empty() {
            warn!("No routes configured, every path is checked and relayed");
        }
        warn!("Serving plain HTTP, put a TLS terminating proxy in front in production");

        // Readiness only once every listener is bound
        sd_notify::notify(true, &[NotifyState::Ready]).context("notify systemd")?;
        srv.run().await.context("run gateway")?;

        info!("Gateway stopped");
        Ok(())
    }

    /// Every request except the health check goes through the decision
    /// pipeline. Once routes are configured, a request matching none of them
    /// is refused without asking the permissions service and never relayed:
    /// its subject could only come from the query string.
    pub fn build_app(
        ctx: Arc<RestfulContext>,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<BoxBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let mut app = App::new()
            .app_data(Data::new(ctx.clone()))
            .app_data(PayloadConfig::new(ctx.payload_limit_mib * 1024 * 1024))
            .service(web::resource(Self::HEALTHZ_PATH).route(web::get().to(Self::handle_healthz)));

        for route in ctx.routes.iter() {
            app = app.route(route, web::route().to(Self::handle_request));
        }

        if ctx.routes.is_empty() {
            app.default_service(web::route().to(Self::handle_request))
        } else {
            app.default_service(web::route().to(Self::handle_unrouted))
        }
    }

    async fn handle_unrouted(req: HttpRequest) -> HttpResponse {
        warn!(
            "Refuse {} {}: no configured route matches the path",
            req.method(),
            req.path()
        );
        HttpResponseError::not_allowed().into()
    }

    async fn handle_request(
        req: HttpRequest,
        body: Bytes,
        ctx: Data<Arc<RestfulContext>>,
    ) -> HttpResponse {
        let view = match Self::request_view(&req, body) {
            Ok(view) => view,
            Err(err) => {
                error!("Read request {} {}: {err:#}", req.method(), req.uri());
                return HttpResponseError::request_error().into();
            }
        };

        let pipeline = ctx.gatekeeper.current();
        let view = match pipeline.check(view).await {
            Ok(view) => view,
            Err(outcome) => return outcome.into(),
        };

        ctx.relay.forward(view).await
    }

    async fn handle_healthz() -> HttpResponse {
        HttpResponse::Ok().json(json!({ "status": "ok" }))
    }

    fn request_view(req: &HttpRequest, body: Bytes) -> Result<GatewayRequest> {
        let base = {
            let info = req.connection_info();
            format!("{}://{}", info.scheme(), info.host())
        };
        let base = Url::parse(&base).with_context(|| format!("parse base url '{base}'"))?;
        GatewayRequest::from_actix(req, body, &base)
    }
}
