use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};

/// The flat configuration keyspace. Values come from an env file (if any)
/// with process environment variables taking precedence.
const KEYS: &[&str] = &[
    "ENVIRONMENT",
    "SERVICE_NAME",
    "SHUTDOWN_TIMEOUT",
    "BROADCAST_MAX_PEERS_PER_BROADCASTER",
    "CACHE_TTL",
    "CACHE_MAX_SIZE",
    "CACHE_EXPIRATION_INTERVAL",
    "COINDESK_URL",
    "COINDESK_API_KEY",
    "COINDESK_POLL_INTERVAL",
    "SERVER_PORT",
    "SERVER_READ_HEADER_TIMEOUT",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read env file '{path}': {source}")]
    EnvFile {
        path: String,
        #[source]
        source: dotenvy::Error,
    },
    #[error("failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration, grouped into sections. The on-disk and
/// environment representation is the flat keyspace above; `RawConfig` is the
/// serde image of that flat form.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub service_name: String,
    /// Grace period for in-flight work on SIGINT/SIGTERM, in seconds.
    pub shutdown_timeout: u64,
    pub broadcast: BroadcastConfig,
    pub cache: CacheConfig,
    pub coindesk: CoinDeskConfig,
    pub server: ServerConfig,
}

/// Broadcaster pool settings.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    pub max_peers_per_broadcaster: usize,
}

/// Replay buffer settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live for buffered entries, in seconds.
    pub ttl: u64,
    /// Maximum number of buffered entries.
    pub max_size: usize,
    /// Cadence of the expiration sweep, in seconds.
    pub expiration_interval: u64,
}

/// Upstream CoinDesk API settings.
#[derive(Debug, Clone)]
pub struct CoinDeskConfig {
    pub url: String,
    pub api_key: String,
    /// Price polling cadence, in seconds.
    pub poll_interval: u64,
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Bound on reading a request head, in seconds.
    pub read_header_timeout: u64,
}

/// One flat field per configuration key, lowercased the way figment's env
/// provider maps variable names.
#[derive(Debug, Serialize, Deserialize)]
struct RawConfig {
    environment: String,
    service_name: String,
    shutdown_timeout: u64,
    broadcast_max_peers_per_broadcaster: usize,
    cache_ttl: u64,
    cache_max_size: usize,
    cache_expiration_interval: u64,
    coindesk_url: String,
    coindesk_api_key: String,
    coindesk_poll_interval: u64,
    server_port: u16,
    server_read_header_timeout: u64,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            environment: raw.environment,
            service_name: raw.service_name,
            shutdown_timeout: raw.shutdown_timeout,
            broadcast: BroadcastConfig {
                max_peers_per_broadcaster: raw.broadcast_max_peers_per_broadcaster,
            },
            cache: CacheConfig {
                ttl: raw.cache_ttl,
                max_size: raw.cache_max_size,
                expiration_interval: raw.cache_expiration_interval,
            },
            coindesk: CoinDeskConfig {
                url: raw.coindesk_url,
                api_key: raw.coindesk_api_key,
                poll_interval: raw.coindesk_poll_interval,
            },
            server: ServerConfig {
                port: raw.server_port,
                read_header_timeout: raw.server_read_header_timeout,
            },
        }
    }
}

impl From<&AppConfig> for RawConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            environment: config.environment.clone(),
            service_name: config.service_name.clone(),
            shutdown_timeout: config.shutdown_timeout,
            broadcast_max_peers_per_broadcaster: config.broadcast.max_peers_per_broadcaster,
            cache_ttl: config.cache.ttl,
            cache_max_size: config.cache.max_size,
            cache_expiration_interval: config.cache.expiration_interval,
            coindesk_url: config.coindesk.url.clone(),
            coindesk_api_key: config.coindesk.api_key.clone(),
            coindesk_poll_interval: config.coindesk.poll_interval,
            server_port: config.server.port,
            server_read_header_timeout: config.server.read_header_timeout,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            service_name: "btc-stream".to_string(),
            shutdown_timeout: 10,
            broadcast: BroadcastConfig {
                max_peers_per_broadcaster: 100,
            },
            cache: CacheConfig {
                ttl: 60,
                max_size: 100,
                expiration_interval: 30,
            },
            coindesk: CoinDeskConfig {
                url: "https://data-api.coindesk.com".to_string(),
                api_key: String::new(),
                poll_interval: 10,
            },
            server: ServerConfig {
                port: 8080,
                read_header_timeout: 5,
            },
        }
    }
}

impl AppConfig {
    /// Layered load: defaults, then the env file (if provided), then process
    /// environment variables. The env file is parsed without touching the
    /// process environment so repeated loads stay independent.
    pub fn load<P: AsRef<Path>>(env_file: Option<P>) -> Result<Self, ConfigError> {
        let mut figment =
            Figment::from(Serialized::defaults(RawConfig::from(&AppConfig::default())));

        if let Some(path) = env_file {
            figment = figment.merge(Serialized::defaults(read_env_file(path.as_ref())?));
        }

        let raw: RawConfig = figment
            .merge(Env::raw().only(KEYS))
            .extract()
            .map_err(Box::new)?;

        let config = AppConfig::from(raw);
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.broadcast.max_peers_per_broadcaster == 0 {
            return Err(ConfigError::Invalid(
                "BROADCAST_MAX_PEERS_PER_BROADCASTER must be at least 1".to_string(),
            ));
        }
        if self.cache.max_size == 0 {
            return Err(ConfigError::Invalid(
                "CACHE_MAX_SIZE must be at least 1".to_string(),
            ));
        }
        if self.cache.ttl == 0 {
            return Err(ConfigError::Invalid("CACHE_TTL must be at least 1".to_string()));
        }
        if self.cache.expiration_interval == 0 {
            return Err(ConfigError::Invalid(
                "CACHE_EXPIRATION_INTERVAL must be at least 1".to_string(),
            ));
        }
        if self.coindesk.url.trim().is_empty() {
            return Err(ConfigError::Invalid("COINDESK_URL must not be empty".to_string()));
        }
        if self.coindesk.poll_interval == 0 {
            return Err(ConfigError::Invalid(
                "COINDESK_POLL_INTERVAL must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }

    pub fn expiration_interval(&self) -> Duration {
        Duration::from_secs(self.expiration_interval)
    }
}

impl CoinDeskConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }
}

impl ServerConfig {
    pub fn read_header_timeout(&self) -> Duration {
        Duration::from_secs(self.read_header_timeout)
    }
}

/// Parse `KEY=value` pairs from an env-format file into a figment-mergeable
/// map keyed by the lowercased field names. Unknown keys are ignored; values
/// get the same type inference the environment provider applies.
fn read_env_file(path: &Path) -> Result<BTreeMap<String, figment::value::Value>, ConfigError> {
    let iter = dotenvy::from_path_iter(path).map_err(|source| ConfigError::EnvFile {
        path: path.display().to_string(),
        source,
    })?;

    let mut map = BTreeMap::new();
    for item in iter {
        let (key, value) = item.map_err(|source| ConfigError::EnvFile {
            path: path.display().to_string(),
            source,
        })?;
        if KEYS.contains(&key.as_str()) {
            map.insert(key.to_ascii_lowercase(), infer_value(&value));
        }
    }

    Ok(map)
}

fn infer_value(raw: &str) -> figment::value::Value {
    if let Ok(n) = raw.parse::<u64>() {
        return figment::value::Value::from(n);
    }
    if let Ok(b) = raw.parse::<bool>() {
        return figment::value::Value::from(b);
    }
    figment::value::Value::from(raw)
}

impl fmt::Display for BroadcastConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "max peers per broadcaster: {}", self.max_peers_per_broadcaster)
    }
}

impl fmt::Display for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ttl: {}s, max size: {}, expiration interval: {}s",
            self.ttl, self.max_size, self.expiration_interval
        )
    }
}

impl fmt::Display for CoinDeskConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.api_key.is_empty() { "unset" } else { "***" };
        write!(
            f,
            "url: {}, api key: {}, poll interval: {}s",
            self.url, key, self.poll_interval
        )
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "port: {}, read header timeout: {}s",
            self.port, self.read_header_timeout
        )
    }
}

impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "env: {}, service: {}, shutdown timeout: {}s, broadcast: ({}), cache: ({}), coindesk: ({}), server: ({})",
            self.environment,
            self.service_name,
            self.shutdown_timeout,
            self.broadcast,
            self.cache,
            self.coindesk,
            self.server
        )
    }
}
