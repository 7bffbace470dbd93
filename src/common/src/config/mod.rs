use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "promtsdb.toml";

/// Prefix for environment variable overrides, e.g. `PROMTSDB__OPENTSDB__URL`
pub const ENV_PREFIX: &str = "PROMTSDB__";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the remote-storage HTTP endpoints listen on
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: String::from("0.0.0.0:9201"),
        }
    }
}

/// Connection settings for the OpenTSDB backend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenTsdbConfig {
    /// Base URL of the OpenTSDB HTTP API
    pub url: String,
    /// Deadline for one read call (all fan-out queries) and for one write batch
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Substituted for empty tag values, which OpenTSDB rejects
    pub empty_tag_value: String,
    /// Optional cap on in-flight backend queries per read call
    pub max_concurrent_queries: Option<usize>,
}

impl Default for OpenTsdbConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://localhost:4242"),
            timeout: Duration::from_secs(30),
            empty_tag_value: String::from("_empty_"),
            max_concurrent_queries: None,
        }
    }
}

/// HTTP client settings shared by the read and write paths
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpClientConfig {
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub tcp_keepalive: Duration,
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Duration,
    /// Skip TLS certificate verification (self-signed backends)
    pub accept_invalid_certs: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            tcp_keepalive: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
            accept_invalid_certs: false,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Remote-storage HTTP server
    pub server: ServerConfig,
    /// OpenTSDB backend
    pub opentsdb: OpenTsdbConfig,
    /// Outbound HTTP client
    pub http: HttpClientConfig,
}

impl Configuration {
    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
    }

    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config = Self::figment()
            .merge(Toml::file(DEFAULT_CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    /// Load configuration from an explicit TOML file, still honouring env overrides
    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        let config = Self::figment()
            .merge(Toml::file_exact(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}
