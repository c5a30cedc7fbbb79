//! Connection settings for the proxy.

use serde::Deserialize;

use crate::client::InfinitudeClientBuilder;
use crate::protocol::{ApiRevision, CONFIG_PATH, DEFAULT_PORT};
use crate::{Error, InfinitudeClient, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub revision: ApiRevision,
    /// Config endpoint; some proxy builds serve it as `/api/system`.
    #[serde(default = "default_config_path")]
    pub config_path: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_config_path() -> String {
    CONFIG_PATH.to_string()
}

impl Config {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            revision: ApiRevision::default(),
            config_path: default_config_path(),
        }
    }

    /// Read `INFINITUDE_HOST` (required), `INFINITUDE_PORT`,
    /// `INFINITUDE_API_REVISION` (`legacy`/`indexed`) and `INFINITUDE_CONFIG_PATH`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("INFINITUDE_HOST")
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| Error::MissingField("INFINITUDE_HOST".to_string()))?;
        let mut config = Config::new(host.trim());

        if let Some(port) = lookup("INFINITUDE_PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Protocol(format!("INFINITUDE_PORT is not a port: {port}")))?;
        }
        if let Some(rev) = lookup("INFINITUDE_API_REVISION") {
            config.revision = ApiRevision::from_name(rev.trim())
                .ok_or_else(|| Error::InvalidMode(format!("api revision {rev}")))?;
        }
        if let Some(path) = lookup("INFINITUDE_CONFIG_PATH").filter(|p| !p.trim().is_empty()) {
            config.config_path = path.trim().to_string();
        }
        Ok(config)
    }

    pub fn builder(&self) -> InfinitudeClientBuilder {
        InfinitudeClient::builder(&self.host)
            .port(self.port)
            .revision(self.revision)
            .config_path(&self.config_path)
    }
}
