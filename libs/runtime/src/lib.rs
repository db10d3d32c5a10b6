pub mod config;
pub mod lifecycle;
pub mod logging;
pub mod shutdown;

pub use config::{AppConfig, BroadcastConfig, CacheConfig, CoinDeskConfig, ConfigError, ServerConfig};
pub use lifecycle::{Lifecycle, LifecycleError, StopReason};
pub use logging::LoggingOptions;
