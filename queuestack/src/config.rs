//! Configuration management

use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub sqs: SqsConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SqsConfig {
    #[serde(default = "default_account_id")]
    pub account_id: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Base URL advertised in queue URLs
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for SqsConfig {
    fn default() -> Self {
        Self {
            account_id: default_account_id(),
            region: default_region(),
            endpoint: None,
        }
    }
}

fn default_port() -> u16 {
    4566
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_account_id() -> String {
    "000000000000".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Without an explicit path, `queuestack.toml` in the working directory is
    /// read if it exists. Nested keys can be set from the environment as
    /// `QUEUESTACK_SQS__REGION` and the like.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("queuestack").required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("QUEUESTACK").separator("__"))
            .build()?;

        Ok(config.try_deserialize::<Config>()?)
    }

    /// Endpoint for queue URLs, derived from the listen port when unset
    pub fn endpoint(&self) -> String {
        self.sqs
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.server.port))
    }
}
