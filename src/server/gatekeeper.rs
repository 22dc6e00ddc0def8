use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use log::{error, info, warn};

use crate::authz::{ClientFactory, DecisionPipeline, HttpClientFactory};
use crate::config::{load_config, GatewayConfig};
use crate::logs::{FacadeLogger, Logger};

/// Owns the active decision pipeline and swaps it on reload. Requests take a
/// snapshot with [`Gatekeeper::current`] and keep it until they finish.
pub struct Gatekeeper {
    pipeline: ArcSwap<DecisionPipeline>,
    logger: Arc<dyn Logger>,
    factory: Arc<dyn ClientFactory>,
}

impl Gatekeeper {
    pub fn new(cfg: &GatewayConfig) -> Result<Self> {
        Self::with_parts(cfg, Arc::new(FacadeLogger), Arc::new(HttpClientFactory))
    }

    pub fn with_parts(
        cfg: &GatewayConfig,
        logger: Arc<dyn Logger>,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self> {
        let pipeline = Self::build_pipeline(cfg, &logger, &factory)?;
        Ok(Self {
            pipeline: ArcSwap::from_pointee(pipeline),
            logger,
            factory,
        })
    }

    pub fn current(&self) -> Arc<DecisionPipeline> {
        self.pipeline.load_full()
    }

    /// Validates the new configuration and swaps it in. On error the active
    /// pipeline is left alone.
    pub fn reload(&self, cfg: &GatewayConfig) -> Result<()> {
        let pipeline = Self::build_pipeline(cfg, &self.logger, &self.factory)?;
        self.pipeline.store(Arc::new(pipeline));
        Ok(())
    }

    pub fn reload_file(&self, path: &Path) -> Result<()> {
        let cfg: GatewayConfig = load_config(path)?;
        self.reload(&cfg)
    }

    /// Reloads from `path` every time the process receives SIGHUP. Settings
    /// outside the filter section (bind, backend, routes) need a restart.
    #[cfg(unix)]
    pub fn watch_hangup(self: Arc<Self>, path: PathBuf) -> Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = signal(SignalKind::hangup()).context("listen for SIGHUP")?;
        tokio::spawn(async move {
            while hangup.recv().await.is_some() {
                info!("Received SIGHUP, reloading config from {}", path.display());
                match self.reload_file(&path) {
                    Ok(()) => info!("Authorization config reloaded"),
                    Err(err) => error!("Reload config failed, keeping the old one: {err:#}"),
                }
            }
        });
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn watch_hangup(self: Arc<Self>, _path: PathBuf) -> Result<()> {
        warn!("Config reload on SIGHUP is not supported on this platform");
        Ok(())
    }

    fn build_pipeline(
        cfg: &GatewayConfig,
        logger: &Arc<dyn Logger>,
        factory: &Arc<dyn ClientFactory>,
    ) -> Result<DecisionPipeline> {
        let porton = cfg.porton().context("validate porton config")?;
        if porton.authz_service.endpoint.scheme() == "http" {
            warn!(
                "Permissions service {} is reached over plain HTTP, bearer tokens are sent unencrypted",
                porton.authz_service.endpoint
            );
        }
        Ok(DecisionPipeline::new(porton)
            .with_logger(logger.clone())
            .with_client_factory(factory.clone()))
    }
}
