//! Command-line runner wiring the script registry to Redis.
//!
//! [`execute`] connects to Redis, loads a script directory, optionally
//! waits for the background registration, and runs one script.

pub mod cli;
pub mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use scripto_core::{LifecycleSignal, RegistryEvent, ScriptEngine, ScriptRegistry};
use scripto_redis::{RedisEngine, RedisSupervisor};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, InvokeMode};
use crate::config::RunnerConfig;

/// Run the script selected on the command line and return its reply.
pub async fn execute(cli: &Cli, config: &RunnerConfig) -> anyhow::Result<redis::Value> {
    let engine = Arc::new(RedisEngine::new());
    let registry = ScriptRegistry::new(Arc::clone(&engine));
    let mut signals = engine.subscribe();
    let mut events = registry.subscribe();

    let cancel = CancellationToken::new();
    let supervisor = RedisSupervisor::new(&config.redis_url, config.connection_config())?;
    let connection_task = supervisor.spawn(Arc::clone(&engine), cancel.clone());

    let result = async {
        wait_for_connection(&mut signals, config.connect_timeout())
            .await
            .with_context(|| format!("could not connect to {}", config.redis_url))?;

        let dir = cli.dir.as_ref().unwrap_or(&config.script_dir);
        registry
            .load_from_dir(dir)
            .await
            .with_context(|| format!("failed to load scripts from {}", dir.display()))?;
        let count = registry.script_count().await;
        tracing::info!(dir = %dir.display(), count, "Scripts loaded");

        if cli.should_wait() {
            let ready =
                wait_for_registration(&mut events, &cli.script, config.register_wait()).await;
            tracing::info!(script = %cli.script, ready, "Registration wait finished");
        }

        let keys = cli.keys.clone();
        let args = cli.args.clone();
        let reply = match cli.mode() {
            InvokeMode::Run => registry.run(&cli.script, keys, args).await,
            InvokeMode::Text => registry.invoke_by_text(&cli.script, keys, args).await,
            InvokeMode::Digest => registry.invoke_by_digest(&cli.script, keys, args).await,
        }?;
        Ok::<_, anyhow::Error>(reply)
    }
    .await;

    registry.shutdown();
    cancel.cancel();
    if let Err(e) = connection_task.await {
        tracing::warn!(error = %e, "Redis connection task did not exit cleanly");
    }
    result
}

/// Wait for the first `Connected` signal.
pub async fn wait_for_connection(
    signals: &mut broadcast::Receiver<LifecycleSignal>,
    timeout: Duration,
) -> anyhow::Result<()> {
    let wait = async {
        loop {
            match signals.recv().await {
                Ok(LifecycleSignal::Connected) => return Ok(()),
                Ok(LifecycleSignal::ConnectionError(reason)) => {
                    tracing::warn!(reason = %reason, "Connection error while starting");
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    anyhow::bail!("lifecycle channel closed")
                }
            }
        }
    };
    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| anyhow::anyhow!("timed out after {}s", timeout.as_secs()))?
}

/// Wait until a registration run covering `script` succeeds.
///
/// Returns `false` on timeout or when a run covering `script` fails; the
/// caller can still run the script by text. Runs for other scripts are
/// ignored either way.
pub async fn wait_for_registration(
    events: &mut broadcast::Receiver<RegistryEvent>,
    script: &str,
    timeout: Duration,
) -> bool {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(RegistryEvent::ScriptsRegistered { names, .. })
                    if names.iter().any(|n| n == script) =>
                {
                    return true;
                }
                Ok(RegistryEvent::RegistrationFailed { names, error, .. })
                    if names.iter().any(|n| n == script) =>
                {
                    tracing::warn!(error = %error, "Background registration failed");
                    return false;
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    };
    tokio::time::timeout(timeout, wait).await.unwrap_or(false)
}
