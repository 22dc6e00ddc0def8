use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

pub mod gateway;
pub mod plugin;

pub use gateway::GatewayConfig;
pub use plugin::{
    AuthzService, ConfigError, FieldError, PortonConfig, Problem, Scope, TenantSource, Variant,
};

pub const CONFIG_ENV: &str = "PORTON_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "porton.toml";

pub trait CommonConfig {
    fn default() -> Self;
    fn complete(&mut self) -> Result<()>;
}

/// Picks the config file: explicit path first, then `$PORTON_CONFIG`, then
/// [`DEFAULT_CONFIG_PATH`]. `~` and env references in the path are expanded.
pub fn resolve_path(path: Option<String>) -> Result<PathBuf> {
    let path = match path {
        Some(path) => path,
        None => match env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => path,
            _ => String::from(DEFAULT_CONFIG_PATH),
        },
    };
    let path = expandenv("config path", path)?;
    Ok(PathBuf::from(path))
}

pub fn load_config<T>(path: &Path) -> Result<T>
where
    T: CommonConfig + DeserializeOwned,
{
    let s = fs::read_to_string(path)
        .with_context(|| format!("read config file: {}", path.display()))?;
    parse_config(&s)
}

pub fn parse_config<T>(s: &str) -> Result<T>
where
    T: CommonConfig + DeserializeOwned,
{
    let mut cfg: T = toml::from_str(s).context("parse config toml")?;
    cfg.complete().context("validate config")?;
    Ok(cfg)
}

/// See: [`shellexpand::full`].
pub fn expandenv(name: &str, s: impl AsRef<str>) -> Result<String> {
    let s =
        shellexpand::full(s.as_ref()).with_context(|| format!("expand env value for '{name}'"))?;
    Ok(s.to_string())
}
