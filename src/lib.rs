//! Inline authorization filter for gateways.
//!
//! Each request is checked against an external permissions service before it
//! reaches the backend. The caller's bearer token is forwarded as is, together
//! with the configured action and a subject taken from the request: either a
//! resource URN or a tenant id. The service's verdict becomes a pass-through,
//! a 403, or a generic 500.
//!
//! ```no_run
//! # async fn demo(req: porton::request::GatewayRequest) -> anyhow::Result<()> {
//! use porton::authz::DecisionPipeline;
//! use porton::config::{PortonConfig, Variant};
//!
//! let raw = serde_json::json!({
//!     "porton": {
//!         "authz_service": { "endpoint": "http://permissions-api:7602" },
//!         "action": "read",
//!         "resource_type": "widget",
//!         "resource_param": "id",
//!     }
//! });
//! let cfg = PortonConfig::parse(Some(&raw), Variant::Resource)?;
//! let pipeline = DecisionPipeline::new(cfg);
//!
//! match pipeline.check(req).await {
//!     Ok(_req) => { /* allowed, keep going */ }
//!     Err(outcome) => { /* render outcome.code / outcome.message */ }
//! }
//! # Ok(())
//! # }
//! ```

pub mod authz;
pub mod cmd;
pub mod config;
pub mod extract;
pub mod header;
pub mod logs;
pub mod request;
pub mod response;
pub mod server;
