use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

use crate::address::Address;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub chain: ChainConfig,
    pub explorer: ExplorerConfig,
    pub aggregator: AggregatorConfig,
    pub cache: CacheConfig,
    pub registration: RegistrationConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self> {
        let configured_path = std::env::var("CHAINBOARD_API_CONFIG")
            .unwrap_or_else(|_| "config/api.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("CHAINBOARD_API_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/api.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize API configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        assert!(
            !self.database.url.is_empty(),
            "Database URL must be specified"
        );
        assert!(
            self.server.port > 0,
            "Server port must be greater than zero"
        );
        assert!(!self.chain.rpc_url.is_empty(), "Chain RPC URL must be set");
        assert!(
            !self.explorer.base_url.is_empty(),
            "Explorer base URL must be set"
        );
        self.registration
            .admin_wallet()
            .context("registration.admin_wallet is not a valid address")?;
        self.aggregator.ensure_bounds()?;
        self.explorer.ensure_bounds()?;
        self.cache.ensure_bounds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        assert!(self.port < 65535, "HTTP port must be below 65535");
        SocketAddr::new(host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub request_timeout_ms: Option<u64>,
}

impl ChainConfig {
    pub fn request_timeout(&self) -> Duration {
        let millis = self.request_timeout_ms.unwrap_or(3_000);
        assert!(millis >= 100, "RPC timeout must be at least 100ms");
        assert!(millis <= 60_000, "RPC timeout cannot exceed 60 seconds");
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub page_size: Option<u64>,
    pub max_pages: Option<u64>,
}

impl ExplorerConfig {
    pub fn request_timeout(&self) -> Duration {
        let millis = self.request_timeout_ms.unwrap_or(10_000);
        assert!(millis >= 100, "Explorer timeout must be at least 100ms");
        assert!(millis <= 60_000, "Explorer timeout cannot exceed 60 seconds");
        Duration::from_millis(millis)
    }

    pub fn page_size(&self) -> u64 {
        self.page_size.unwrap_or(200)
    }

    pub fn max_pages(&self) -> u64 {
        self.max_pages.unwrap_or(50)
    }

    pub fn ensure_bounds(&self) -> Result<()> {
        assert!(self.page_size() > 0, "Explorer page size must be positive");
        assert!(
            self.page_size() <= 10_000,
            "Explorer page size exceeds API maximum"
        );
        assert!(self.max_pages() > 0, "Explorer page cap must be positive");
        assert!(
            self.max_pages() <= 1_000,
            "Explorer page cap exceeds defensive limit"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "AggregatorConfig::default_pass_interval_minutes")]
    pub pass_interval_minutes: u64,
    pub concurrency: Option<usize>,
    pub throttle_ms: Option<u64>,
    #[serde(default)]
    pub run_on_start: bool,
}

impl AggregatorConfig {
    pub fn pass_interval(&self) -> Duration {
        assert!(
            self.pass_interval_minutes >= 1,
            "Pass interval must be at least one minute"
        );
        assert!(
            self.pass_interval_minutes <= 10_080,
            "Pass interval must be at most one week"
        );
        Duration::from_secs(self.pass_interval_minutes * 60)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(4)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms.unwrap_or(250))
    }

    pub fn ensure_bounds(&self) -> Result<()> {
        assert!(self.concurrency() > 0, "Worker pool must not be empty");
        assert!(
            self.concurrency() <= 64,
            "Worker pool exceeds defensive limit"
        );
        assert!(
            self.throttle() <= Duration::from_secs(60),
            "Inter-request delay exceeds one minute"
        );
        let _ = self.pass_interval();
        Ok(())
    }

    const fn default_pass_interval_minutes() -> u64 {
        720
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub leaderboards_max_capacity: u64,
    pub leaderboards_ttl_seconds: u64,
    pub stats_max_capacity: u64,
    pub stats_ttl_seconds: u64,
}

impl CacheConfig {
    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.leaderboards_max_capacity >= 10,
            "Leaderboard cache capacity must be at least 10"
        );
        assert!(
            self.leaderboards_ttl_seconds <= 86_400,
            "Leaderboard cache TTL cannot exceed one day"
        );
        assert!(
            self.stats_max_capacity >= 100,
            "Stats cache capacity must be at least 100"
        );
        assert!(
            self.stats_ttl_seconds <= 86_400,
            "Stats cache TTL cannot exceed one day"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    #[serde(default = "RegistrationConfig::default_min_description_len")]
    pub min_description_len: usize,
    pub admin_wallet: String,
}

impl RegistrationConfig {
    /// The injected admin wallet in canonical form. Compared at the HTTP
    /// boundary via constant-time equality, never by raw string.
    pub fn admin_wallet(&self) -> Result<Address> {
        Address::parse(&self.admin_wallet)
            .map_err(|err| anyhow::anyhow!("invalid admin wallet: {err}"))
    }

    const fn default_min_description_len() -> usize {
        32
    }
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}
