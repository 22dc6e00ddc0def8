mod gatekeeper;
mod proxy;
mod restful;

pub use gatekeeper::Gatekeeper;
pub use proxy::Relay;
pub use restful::{RestfulContext, RestfulServer};

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::GatewayConfig;

/// Wires a validated gateway configuration into a ready-to-run server.
pub fn build(cfg: &GatewayConfig) -> Result<(Arc<Gatekeeper>, RestfulServer)> {
    let gatekeeper = Arc::new(Gatekeeper::new(cfg).context("init gatekeeper")?);
    let relay = Relay::new(cfg.backend_url()?)?;

    let ctx = Arc::new(RestfulContext {
        gatekeeper: gatekeeper.clone(),
        relay,
        routes: cfg.routes.clone(),
        payload_limit_mib: cfg.payload_limit_mib,
    });

    let mut srv = RestfulServer::new(cfg.bind.clone(), ctx);
    if cfg.keep_alive_secs > 0 {
        srv.set_keep_alive_secs(cfg.keep_alive_secs);
    }
    if cfg.workers > 0 {
        srv.set_workers(cfg.workers);
    }

    Ok((gatekeeper, srv))
}
