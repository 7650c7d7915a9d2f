//! Configuration Model

use config::builder::DefaultState;
use config::{
    Config as ConfigRaw,
    ConfigBuilder,
    ConfigError,
    Environment,
    File,
    FileFormat,
};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Kafka topic carrying raw telemetry signal records.
    pub signals_topic: String,
    /// Kafka topic carrying discrete telemetry event records.
    pub events_topic: String,
    /// Comma-separated bootstrap broker list for the partitioned log.
    pub log_brokers: String,
    /// Consumer group id shared by both ingestion pipelines.
    pub group_id: String,
    /// Bound on concurrent in-flight deliveries per ingestion pipeline.
    pub max_in_flight: u32,
    /// Address of the ERC-721 vehicle identity contract.
    pub vehicle_nft_address: String,
    /// Chain id the vehicle identity contract is deployed on.
    pub chain_id: u64,
    /// Base URL of the identity/access collaborator.
    pub identity_url: String,
    /// gRPC address of the access-grant collaborator.
    pub access_grpc_addr: String,
    /// JWKS URL used to validate tokens minted for asset access checks.
    pub jwks_url: String,
    /// Consecutive webhook failures before a trigger is auto-disabled.
    /// Floored at 1 regardless of what's configured.
    pub max_webhook_failure_count: i32,
    /// Database connection string (sqlite or postgres).
    pub db_dsn: String,
    /// Port the process listens on for health checks only; no other HTTP
    /// surface is exposed by this binary.
    pub port: u16,

    /// Address the Prometheus exporter binds to.
    pub prometheus_address: String,
    pub prometheus_port: u16,
    pub log_format: LogFormat,
    /// How often the subscription index refreshes from the trigger store
    /// in the absence of a mutation-triggered refresh.
    pub index_refresh_interval_s: u64,
    /// How long a mutation-triggered refresh is deferred to coalesce bursts
    /// of control-plane writes into a single rebuild.
    pub index_refresh_deferral_ms: u64,
}

impl Config {
    /// `maxWebhookFailureCount` floored at 1 per spec, regardless of what a
    /// misconfigured deployment supplies.
    pub fn max_webhook_failure_count(&self) -> i32 {
        self.max_webhook_failure_count.max(1)
    }
}

#[derive(Debug)]
pub struct ConfigLoader {
    builder: ConfigBuilder<DefaultState>,
}

impl ConfigLoader {
    /// Loads a fresh copy of the configuration from source.
    pub fn load(&self) -> Result<Config, ConfigError> {
        Self::deserialize(self.builder.build_cloned()?)
    }

    /// Creates a new loader configured to load the default and overlay the
    /// user-supplied config (if supplied), then environment variables.
    ///
    /// * `config_file`: The path of the configuration file to load.
    pub fn from_path(path: &Option<String>) -> ConfigLoader {
        let raw = include_str!("default.toml");
        let mut builder = ConfigRaw::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .add_source(
                Environment::with_prefix("TRIGGERS")
                    .try_parsing(true)
                    .separator("__"),
            );
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        ConfigLoader { builder }
    }

    fn deserialize(config: ConfigRaw) -> Result<Config, ConfigError> {
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_loads() {
        let loader = ConfigLoader::from_path(&None);
        let config = loader.load().unwrap();
        assert_eq!(config.max_in_flight, 1);
        assert_eq!(config.max_webhook_failure_count(), 5);
    }

    #[test]
    fn floors_misconfigured_failure_count() {
        std::env::set_var("TRIGGERS__MAX_WEBHOOK_FAILURE_COUNT", "0");
        let loader = ConfigLoader::from_path(&None);
        let config = loader.load().unwrap();
        assert_eq!(config.max_webhook_failure_count(), 1);
        std::env::remove_var("TRIGGERS__MAX_WEBHOOK_FAILURE_COUNT");
    }
}
