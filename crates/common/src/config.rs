use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// Committed config file; holds everything except a real token.
pub const DEFAULT_CONFIG_PATH: &str = "config/wallet_monitor.toml";

/// Local override with the bearer token. Preferred when present.
pub const PRIVATE_CONFIG_PATH: &str = "config/wallet_monitor.private.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub general: General,
    pub database: Database,
    pub api: Api,
    #[serde(default)]
    pub observability: Observability,
}

#[derive(Debug, Clone, Deserialize)]
pub struct General {
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: String,
    pub token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Observability {
    pub prometheus_port: Option<u16>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {path}"))?;
        Self::from_toml_str(&content).with_context(|| format!("invalid config file: {path}"))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("failed to parse wallet monitor config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.api.token.trim().is_empty(), "api.token must be set");
        anyhow::ensure!(
            !self.database.path.trim().is_empty(),
            "database.path must be set"
        );
        anyhow::ensure!(self.api.timeout_secs > 0, "api.timeout_secs must be > 0");
        Url::parse(&self.api.base_url)
            .with_context(|| format!("api.base_url is not a valid URL: {}", self.api.base_url))?;
        Ok(())
    }

    /// Path to load when none was given on the command line.
    pub fn default_config_path() -> String {
        Self::resolve_config_path(Path::new("."))
    }

    fn resolve_config_path(root: &Path) -> String {
        let private = root.join(PRIVATE_CONFIG_PATH);
        if private.exists() {
            return private.to_string_lossy().to_string();
        }
        root.join(DEFAULT_CONFIG_PATH).to_string_lossy().to_string()
    }

    /// Config path from argv[1], falling back to [`Self::default_config_path`].
    pub fn path_from_args<I>(mut args: I) -> String
    where
        I: Iterator<Item = String>,
    {
        // Drop argv[0].
        let _ = args.next();
        args.next().unwrap_or_else(Self::default_config_path)
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}
