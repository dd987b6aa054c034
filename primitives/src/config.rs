use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::Address;

pub use toml::de::Error as TomlError;

pub static DEVELOPMENT_CONFIG: Lazy<Config> = Lazy::new(|| {
    Config::try_toml(include_str!("../../docs/config/dev.toml"))
        .expect("Failed to parse dev.toml config file")
});

pub static PRODUCTION_CONFIG: Lazy<Config> = Lazy::new(|| {
    Config::try_toml(include_str!("../../docs/config/prod.toml"))
        .expect("Failed to parse prod.toml config file")
});

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "camelCase")]
/// The environment in which the application is running
/// Defaults to [`Environment::Development`]
pub enum Environment {
    /// The default development setup is running a local test validator and IPFS node.
    Development,
    Production,
}

impl Default for Environment {
    fn default() -> Self {
        Self::Development
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The address of the deployed channel program.
    pub program_id: Address,
    /// The oracle which cosigns the channel tokens.
    pub oracle_address: Address,
    /// In milliseconds
    /// Set's the Client timeout for the content store, the naming service and the chain RPC.
    pub fetch_timeout: u32,
    /// In milliseconds
    /// How long to wait for a submitted transaction to be confirmed.
    pub confirmation_timeout: u32,
    /// In milliseconds
    pub confirmation_poll_interval: u32,
    /// The maximum number of tokens walked when reconstructing a channel history.
    pub max_history_depth: usize,
    pub ipfs: IpfsConfig,
    pub chain: ChainConfig,
}

impl Config {
    /// Utility method that will deserialize a Toml file content into a [`Config`].
    ///
    /// Instead of relying on the `toml` crate directly, use this method instead.
    pub fn try_toml(toml: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout.into())
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout.into())
    }

    pub fn confirmation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_interval.into())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IpfsConfig {
    /// The HTTP API of the IPFS node, e.g. `http://127.0.0.1:5001`
    pub api_url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// The JSON-RPC endpoint of the chain, e.g. `http://127.0.0.1:8899`
    pub rpc_url: String,
    /// The commitment used for reading accounts and confirming transactions.
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Toml parsing: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("File reading: {0}")]
    InvalidFile(#[from] std::io::Error),
}

/// If no `config_file` path is provided it will load the [`Environment`] configuration.
/// If `config_file` path is provided it will try to read and parse the file in Toml format.
pub fn configuration(
    environment: Environment,
    config_file: Option<&str>,
) -> Result<Config, ConfigError> {
    match config_file {
        Some(config_file) => {
            let content = std::fs::read(config_file)?;

            Ok(toml::from_slice(&content)?)
        }
        None => match environment {
            Environment::Production => Ok(PRODUCTION_CONFIG.clone()),
            Environment::Development => Ok(DEVELOPMENT_CONFIG.clone()),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn built_in_configs_parse() {
        let development = configuration(Environment::Development, None).expect("Should parse");
        let production = configuration(Environment::Production, None).expect("Should parse");

        assert_eq!("confirmed", development.chain.commitment);
        assert_eq!(Duration::from_millis(10_000), development.fetch_timeout());
        assert_ne!(development.chain.rpc_url, production.chain.rpc_url);
    }

    #[test]
    fn environment() {
        let development = serde_json::from_value::<Environment>(json!("development"))
            .expect("Should deserialize");
        let production =
            serde_json::from_value::<Environment>(json!("production")).expect("Should deserialize");

        assert_eq!(Environment::Development, development);
        assert_eq!(Environment::Production, production);
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            configuration(Environment::Development, Some("./does-not-exist.toml")),
            Err(ConfigError::InvalidFile(_))
        ));
    }
}
