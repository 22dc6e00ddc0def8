use anyhow::{Context, Result};
use clap::Args;
use log::{debug, info};

use crate::config::{self, GatewayConfig};
use crate::{logs, server};

/// Start the authorizing gateway
#[derive(Args)]
pub struct ServeArgs {
    /// The gateway config file, default is `$PORTON_CONFIG` or `porton.toml`
    #[clap(short, long)]
    pub config: Option<String>,

    /// The log level, overrides `log_level` in the config file
    #[clap(short, long)]
    pub level: Option<String>,
}

impl ServeArgs {
    pub async fn run(&self) -> Result<()> {
        let path = config::resolve_path(self.config.clone())?;
        let cfg: GatewayConfig = config::load_config(&path)?;

        let level = self.level.as_deref().unwrap_or(&cfg.log_level);
        logs::init(level)?;
        info!("Loaded config from {}", path.display());
        debug!("Use config: {:?}", cfg);

        let (gatekeeper, srv) = server::build(&cfg)?;
        gatekeeper
            .watch_hangup(path)
            .context("watch config reload")?;

        srv.run().await
    }
}
