use anyhow::{Context, Result};
use clap::Args;

use crate::config::{self, GatewayConfig, Scope};

/// Validate the gateway config file and print the resolved filter config
#[derive(Args)]
pub struct CheckArgs {
    /// The gateway config file, default is `$PORTON_CONFIG` or `porton.toml`
    #[clap(short, long)]
    pub config: Option<String>,
}

impl CheckArgs {
    pub fn run(&self) -> Result<()> {
        let path = config::resolve_path(self.config.clone())?;
        let cfg: GatewayConfig = config::load_config(&path)?;
        let porton = cfg.porton().context("validate porton config")?;

        println!("Config file:    {}", path.display());
        println!("Bind:           {}", cfg.bind);
        println!("Backend:        {}", cfg.backend);
        println!("Authz endpoint: {}", porton.authz_service.endpoint);
        println!("Authz timeout:  {}ms", porton.authz_service.timeout_millis);
        println!("Action:         {}", porton.action);
        match porton.scope {
            Scope::Resource {
                resource_type,
                resource_param,
            } => {
                println!("Resource type:  {resource_type}");
                println!("Resource param: {resource_param}");
            }
            Scope::Tenant { source } => {
                println!("Tenant source:  {}", source.as_str());
            }
        }
        Ok(())
    }
}
