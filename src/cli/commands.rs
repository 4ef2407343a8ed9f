//! Subcommand execution

use std::time::Duration;

use anyhow::Context;
use tracing::info;

use super::{Cli, Command, Overrides};
use crate::config::AppConfig;
use crate::domain::cache::{Cache, CacheExt, NamespacedCache};
use crate::infrastructure::cache::CacheFactory;
use crate::infrastructure::logging;

/// Runs one CLI invocation
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    apply_overrides(&mut config, &cli.overrides);
    logging::init_logging(&config.logging);

    let handle = CacheFactory::new()
        .create(&config.cache)
        .context("Failed to create cache")?;

    let result = execute(&handle.cache, cli.command).await;
    handle.shutdown();

    result
}

fn apply_overrides(config: &mut AppConfig, overrides: &Overrides) {
    if let Some(prefix) = &overrides.prefix {
        config.cache.prefix = prefix.clone();
    }

    if let Some(backend) = &overrides.backend {
        config.cache.backend = backend.clone();
    }

    if let Some(host) = &overrides.host {
        config.cache.host = host.clone();
    }

    if let Some(timeout_ms) = overrides.timeout_ms {
        config.cache.operation_timeout_ms = timeout_ms;
    }
}

async fn execute(cache: &NamespacedCache, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Has { key } => {
            println!("{}", cache.has(&key).await?);
        }
        Command::Get { key } => {
            let value: serde_json::Value = cache
                .get(&key)
                .await
                .with_context(|| format!("Failed to read '{}'", key))?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Set { key, value, ttl } => {
            let value = parse_value(&value);
            cache
                .set(&key, &value, ttl.map(Duration::from_secs))
                .await
                .with_context(|| format!("Failed to write '{}'", key))?;
            info!(key = %key, "Stored");
        }
        Command::Forget { key } => {
            cache.forget(&key).await?;
            info!(key = %key, "Forgotten");
        }
        Command::EmptyByMatch { pattern } => {
            let deleted = cache.empty_by_match(&pattern).await?;
            println!("{}", deleted);
        }
        Command::Empty => {
            let deleted = cache.empty().await?;
            println!("{}", deleted);
        }
        Command::Ping => {
            cache.ping().await.context("Store is unreachable")?;
            println!("PONG");
        }
    }

    Ok(())
}

fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}
