use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Cache backend and namespace settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// `redis` or `memory`
    pub backend: String,
    /// `host`, `host:port` or `redis://` URL
    pub host: String,
    pub password: Option<String>,
    pub database: i64,
    /// Namespace prefix for every key
    pub prefix: String,
    pub default_ttl_secs: u64,
    pub operation_timeout_ms: u64,
    /// COUNT hint for SCAN; unset sends a bare SCAN
    pub scan_count: Option<usize>,
    pub max_scan_iterations: usize,
    /// Entry bound for the memory backend
    pub memory_max_capacity: u64,
    pub pool: PoolSettings,
}

/// Connection pool settings for the Redis backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub max_size: usize,
    pub wait_timeout_ms: u64,
    pub create_timeout_ms: u64,
    pub recycle_timeout_ms: u64,
    pub idle_timeout_secs: u64,
    pub reap_interval_secs: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: "redis".to_string(),
            host: "127.0.0.1:6379".to_string(),
            password: None,
            database: 0,
            prefix: "cache".to_string(),
            default_ttl_secs: 3600,
            operation_timeout_ms: 5000,
            scan_count: Some(100),
            max_scan_iterations: 10_000,
            memory_max_capacity: 10_000,
            pool: PoolSettings::default(),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 64,
            wait_timeout_ms: 2000,
            create_timeout_ms: 5000,
            recycle_timeout_ms: 1000,
            idle_timeout_secs: 240,
            reap_interval_secs: 60,
        }
    }
}

impl AppConfig {
    /// Loads configuration from files, `APP__*` variables and the
    /// `REDIS_HOST` / `REDIS_PASSWORD` / `REDIS_PREFIX` variables
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::from_builder(with_legacy_env(builder)?)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, config::ConfigError> {
        builder.build()?.try_deserialize()
    }
}

fn with_legacy_env(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    builder
        .set_override_option("cache.host", std::env::var("REDIS_HOST").ok())?
        .set_override_option("cache.password", std::env::var("REDIS_PASSWORD").ok())?
        .set_override_option("cache.prefix", std::env::var("REDIS_PREFIX").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn from_toml(toml: &str) -> AppConfig {
        let builder = config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        AppConfig::from_builder(builder).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_toml("");

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.cache.backend, "redis");
        assert_eq!(config.cache.default_ttl_secs, 3600);
        assert_eq!(config.cache.scan_count, Some(100));
        assert_eq!(config.cache.pool.max_size, 64);
    }

    #[test]
    fn test_partial_override() {
        let config = from_toml(
            r#"
            [logging]
            format = "json"

            [cache]
            backend = "memory"
            prefix = "app"
            default_ttl_secs = 60

            [cache.pool]
            max_size = 8
            "#,
        );

        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.cache.backend, "memory");
        assert_eq!(config.cache.prefix, "app");
        assert_eq!(config.cache.default_ttl_secs, 60);
        assert_eq!(config.cache.pool.max_size, 8);
        assert_eq!(config.cache.pool.idle_timeout_secs, 240);
    }

    #[test]
    fn test_overrides_win() {
        let builder = config::Config::builder()
            .add_source(File::from_str("[cache]\nprefix = \"file\"", FileFormat::Toml))
            .set_override_option("cache.prefix", Some("env"))
            .unwrap()
            .set_override_option("cache.host", None::<String>)
            .unwrap();

        let config = AppConfig::from_builder(builder).unwrap();
        assert_eq!(config.cache.prefix, "env");
        assert_eq!(config.cache.host, "127.0.0.1:6379");
    }
}
