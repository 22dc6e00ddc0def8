use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::logs;

use super::plugin::{ConfigError, PortonConfig, Variant};
use super::{expandenv, CommonConfig};

/// Configuration of the standalone gateway: where to listen, where to relay
/// allowed requests, and the filter section under `extra_config`.
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "GatewayConfig::default_bind")]
    pub bind: String,

    /// Base URL allowed requests are relayed to.
    #[serde(default = "GatewayConfig::default_backend")]
    pub backend: String,

    #[serde(default = "GatewayConfig::default_variant")]
    pub variant: Variant,

    /// Route patterns, e.g. `/v1/widgets/{id}`. Their placeholders become
    /// request params. When any route is set, requests matching none of them
    /// are refused.
    #[serde(default = "GatewayConfig::default_routes")]
    pub routes: Vec<String>,

    #[serde(default = "GatewayConfig::default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    #[serde(default = "GatewayConfig::default_workers")]
    pub workers: u64,

    #[serde(default = "GatewayConfig::default_payload_limit_mib")]
    pub payload_limit_mib: usize,

    #[serde(default = "GatewayConfig::default_log_level")]
    pub log_level: String,

    /// Raw, untyped plugin sections. Only the `porton` key is read.
    #[serde(default)]
    pub extra_config: Option<Value>,
}

impl CommonConfig for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            backend: Self::default_backend(),
            variant: Self::default_variant(),
            routes: Self::default_routes(),
            keep_alive_secs: Self::default_keep_alive_secs(),
            workers: Self::default_workers(),
            payload_limit_mib: Self::default_payload_limit_mib(),
            log_level: Self::default_log_level(),
            extra_config: None,
        }
    }

    fn complete(&mut self) -> Result<()> {
        self.bind = expandenv("bind", &self.bind)?;
        if self.bind.is_empty() {
            bail!("bind cannot be empty");
        }

        self.backend = expandenv("backend", &self.backend)?;
        if self.backend.is_empty() {
            bail!("backend cannot be empty");
        }
        self.backend_url().context("backend")?;

        for route in self.routes.iter() {
            if !route.starts_with('/') {
                bail!("route '{route}' should start with '/'");
            }
        }

        if self.payload_limit_mib < Self::MIN_PAYLOAD_LIMIT_MIB {
            bail!(
                "payload_limit_mib must be greater than or equal to {}",
                Self::MIN_PAYLOAD_LIMIT_MIB
            );
        }
        if self.payload_limit_mib > Self::MAX_PAYLOAD_LIMIT_MIB {
            bail!(
                "payload_limit_mib must be less than or equal to {}",
                Self::MAX_PAYLOAD_LIMIT_MIB
            );
        }

        logs::parse_level(&self.log_level).context("log_level")?;

        Ok(())
    }
}

impl GatewayConfig {
    const MAX_PAYLOAD_LIMIT_MIB: usize = 10;
    const MIN_PAYLOAD_LIMIT_MIB: usize = 1;

    pub fn backend_url(&self) -> Result<Url> {
        let url = Url::parse(&self.backend)
            .with_context(|| format!("parse url '{}'", self.backend))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("unsupported scheme '{}' in url", url.scheme());
        }
        Ok(url)
    }

    /// Validates the filter section. Kept apart from [`CommonConfig::complete`]
    /// so callers can tell filter problems from gateway problems.
    pub fn porton(&self) -> Result<PortonConfig, ConfigError> {
        PortonConfig::parse(self.extra_config.as_ref(), self.variant)
    }

    pub fn default_bind() -> String {
        String::from("127.0.0.1:8080")
    }

    pub fn default_backend() -> String {
        String::new()
    }

    pub fn default_variant() -> Variant {
        Variant::Resource
    }

    pub fn default_routes() -> Vec<String> {
        Vec::new()
    }

    pub fn default_keep_alive_secs() -> u64 {
        0
    }

    pub fn default_workers() -> u64 {
        0
    }

    pub fn default_payload_limit_mib() -> usize {
        3
    }

    pub fn default_log_level() -> String {
        String::from("info")
    }
}
