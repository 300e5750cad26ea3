use core_config::{
    ConfigError, Environment, FromEnv, env_optional, env_or_default, env_parse, env_required,
    load_dotenv, server::ServerConfig,
};
use database::postgres::PostgresConfig;
use std::time::Duration;

/// Settings of the linking flow itself
#[derive(Clone, Debug)]
pub struct LinkingConfig {
    /// Public URL of `/linked_role`; hop 1 appends `/{site}`
    pub redirect_uri: String,
    pub sites_file: String,
    pub http_timeout_secs: u64,
    /// Appended to the outbound User-Agent
    pub invite_url: Option<String>,
    pub discord_api_url: String,
    pub discord_oauth_url: String,
}

impl LinkingConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Environment variables:
/// - `REDIRECT_URI` (required)
/// - `SITES_FILE` (default: sites.json)
/// - `HTTP_TIMEOUT_SECS` (default: 5)
/// - `INVITE_URL` (optional)
/// - `DISCORD_API_URL` (default: https://discord.com/api/v10)
/// - `DISCORD_OAUTH_URL` (default: https://discord.com)
impl FromEnv for LinkingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            redirect_uri: env_required("REDIRECT_URI")?,
            sites_file: env_or_default("SITES_FILE", "sites.json"),
            http_timeout_secs: env_parse("HTTP_TIMEOUT_SECS", "5")?,
            invite_url: env_optional("INVITE_URL"),
            discord_api_url: env_or_default("DISCORD_API_URL", "https://discord.com/api/v10"),
            discord_oauth_url: env_or_default("DISCORD_OAUTH_URL", "https://discord.com"),
        })
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: PostgresConfig,
    pub linking: LinkingConfig,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        load_dotenv();

        Ok(Self {
            environment: Environment::from_env(),
            server: ServerConfig::from_env()?, // HOST=0.0.0.0, PORT=8080
            database: PostgresConfig::from_env()?, // DATABASE_URL is required
            linking: LinkingConfig::from_env()?,
            run_migrations: env_parse("RUN_MIGRATIONS", "true")?,
        })
    }

    /// Development builds announce themselves as `testing`.
    pub fn version(&self) -> &'static str {
        if self.environment.is_production() {
            env!("CARGO_PKG_VERSION")
        } else {
            "testing"
        }
    }
}
