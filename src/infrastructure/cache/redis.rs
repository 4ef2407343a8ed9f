//! Redis key-value store backed by a deadpool connection pool

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{
    Config as PoolSettings, Connection, Pool, PoolConfig, PoolError, Runtime, Timeouts,
};
use redis::{ConnectionAddr, ConnectionInfo, IntoConnectionInfo, RedisConnectionInfo, RedisError};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::cache::{KeyValueStore, ScanPage};
use crate::domain::DomainError;

const DEFAULT_PORT: u16 = 6379;

/// Configuration for the Redis store
#[derive(Clone)]
pub struct RedisStoreConfig {
    /// `host`, `host:port` or a full `redis://` URL
    pub host: String,
    /// Password sent with AUTH, overriding any password in a URL
    pub password: Option<String>,
    /// Logical database index; a non-zero value overrides the one in a URL
    pub database: i64,
    /// Maximum number of open connections
    pub max_size: usize,
    /// How long a caller waits for a free connection
    pub wait_timeout: Duration,
    /// How long opening a new connection may take
    pub create_timeout: Duration,
    /// How long the liveness check on a pooled connection may take
    pub recycle_timeout: Duration,
    /// Idle connections older than this are dropped by the reaper
    pub idle_timeout: Duration,
}

impl fmt::Debug for RedisStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStoreConfig")
            .field("host", &self.host)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("max_size", &self.max_size)
            .field("wait_timeout", &self.wait_timeout)
            .field("create_timeout", &self.create_timeout)
            .field("recycle_timeout", &self.recycle_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1:6379".to_string(),
            password: None,
            database: 0,
            max_size: 64,
            wait_timeout: Duration::from_secs(2),
            create_timeout: Duration::from_secs(5),
            recycle_timeout: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(240),
        }
    }
}

impl RedisStoreConfig {
    /// Creates a new configuration for the given host
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Sets the password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the database index
    pub fn with_database(mut self, database: i64) -> Self {
        self.database = database;
        self
    }

    /// Sets the pool size
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Sets the idle timeout
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Resolves the host setting into connection info
    pub fn connection_info(&self) -> Result<ConnectionInfo, DomainError> {
        let mut info = if self.host.contains("://") {
            self.host.as_str().into_connection_info().map_err(|e| {
                DomainError::configuration(format!("Invalid Redis URL '{}': {}", self.host, e))
            })?
        } else {
            let (host, port) = split_host_port(&self.host)?;
            ConnectionInfo {
                addr: ConnectionAddr::Tcp(host, port),
                redis: RedisConnectionInfo {
                    db: self.database,
                    ..Default::default()
                },
            }
        };

        if self.database != 0 {
            info.redis.db = self.database;
        }

        if let Some(password) = self.password.as_ref().filter(|p| !p.is_empty()) {
            info.redis.password = Some(password.clone());
        }

        Ok(info)
    }
}

fn split_host_port(address: &str) -> Result<(String, u16), DomainError> {
    if address.is_empty() {
        return Err(DomainError::configuration("Redis host must not be empty"));
    }

    let invalid_port =
        || DomainError::configuration(format!("Invalid Redis port in '{}'", address));

    // Bracketed IPv6 literal, optionally followed by a port
    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| {
            DomainError::configuration(format!("Unclosed '[' in Redis host '{}'", address))
        })?;

        let port = match tail {
            "" => DEFAULT_PORT,
            _ => tail
                .strip_prefix(':')
                .and_then(|port| port.parse().ok())
                .ok_or_else(invalid_port)?,
        };

        return Ok((host.to_string(), port));
    }

    // More than one colon without brackets is a bare IPv6 address
    if address.matches(':').count() > 1 {
        return Ok((address.to_string(), DEFAULT_PORT));
    }

    match address.split_once(':') {
        Some((host, port)) => {
            let port = port.parse().map_err(|_| invalid_port())?;
            Ok((host.to_string(), port))
        }
        None => Ok((address.to_string(), DEFAULT_PORT)),
    }
}

/// Redis store implementation
///
/// Each command checks a connection out of the pool and returns it when the
/// guard drops, on success and error alike. The pool pings a connection
/// before handing it out again and discards it if the ping fails.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    config: RedisStoreConfig,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("config", &self.config)
            .field("pool", &self.pool.status())
            .finish()
    }
}

impl RedisStore {
    /// Builds the pool; connections are opened lazily on first use
    pub fn connect(config: RedisStoreConfig) -> Result<Self, DomainError> {
        if config.max_size == 0 {
            return Err(DomainError::configuration(
                "Redis pool size must be positive",
            ));
        }

        let mut settings = PoolSettings::from_connection_info(config.connection_info()?);
        let mut pool_config = PoolConfig::new(config.max_size);
        let mut timeouts = Timeouts::default();
        timeouts.wait = Some(config.wait_timeout);
        timeouts.create = Some(config.create_timeout);
        timeouts.recycle = Some(config.recycle_timeout);
        pool_config.timeouts = timeouts;
        settings.pool = Some(pool_config);

        let pool = settings
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| DomainError::configuration(format!("Failed to create Redis pool: {}", e)))?;

        info!(host = %config.host, max_size = config.max_size, "Redis pool created");

        Ok(Self { pool, config })
    }

    /// Drops idle connections every `interval`
    pub fn spawn_idle_reaper(&self, interval: Duration) -> JoinHandle<()> {
        let pool = self.pool.clone();
        let idle_timeout = self.config.idle_timeout;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                if pool.is_closed() {
                    break;
                }

                let result = pool.retain(|_, metrics| metrics.last_used() < idle_timeout);
                if !result.removed.is_empty() {
                    debug!(
                        removed = result.removed.len(),
                        retained = result.retained,
                        "Reaped idle Redis connections"
                    );
                }
            }
        })
    }

    /// Closes the pool; checked-out connections are dropped on return
    pub fn close(&self) {
        self.pool.close();
        info!(host = %self.config.host, "Redis pool closed");
    }

    async fn connection(&self) -> Result<Connection, DomainError> {
        self.pool.get().await.map_err(map_pool_error)
    }
}

fn map_pool_error(error: PoolError) -> DomainError {
    match error {
        PoolError::Timeout(kind) => {
            DomainError::timeout(format!("Redis pool {:?} timeout", kind))
        }
        PoolError::Backend(e) => map_redis_error("CONNECT", "-", e),
        other => DomainError::transport(format!("Redis pool unavailable: {}", other)),
    }
}

fn map_redis_error(command: &str, key: &str, error: RedisError) -> DomainError {
    let message = format!("{} '{}': {}", command, key, error);

    if error.is_timeout() {
        DomainError::timeout(message)
    } else {
        DomainError::transport(message)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        let mut conn = self.connection().await?;

        redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("EXISTS", key, e))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DomainError> {
        let mut conn = self.connection().await?;

        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("GET", key, e))
    }

    async fn set_ex(&self, key: &str, seconds: u64, value: &[u8]) -> Result<(), DomainError> {
        let mut conn = self.connection().await?;

        redis::cmd("SETEX")
            .arg(key)
            .arg(seconds)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| map_redis_error("SETEX", key, e))
    }

    async fn del(&self, key: &str) -> Result<u64, DomainError> {
        let mut conn = self.connection().await?;

        redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("DEL", key, e))
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: Option<usize>,
    ) -> Result<ScanPage, DomainError> {
        let mut conn = self.connection().await?;

        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor).arg("MATCH").arg(pattern);
        if let Some(count) = count {
            cmd.arg("COUNT").arg(count);
        }

        let (next, keys): (u64, Vec<String>) = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("SCAN", pattern, e))?;

        Ok(ScanPage::new(next, keys))
    }

    async fn ping(&self) -> Result<(), DomainError> {
        let mut conn = self.connection().await?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| map_redis_error("PING", "-", e))
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
