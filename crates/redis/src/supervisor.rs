//! Connection supervisor for a [`RedisEngine`].
//!
//! [`RedisSupervisor::spawn`] starts a long-lived task that connects,
//! installs the connection in the engine (raising `Connected`) and health
//! checks it with `PING`. A failed connect attempt or a failed health check
//! raises `ConnectionError`, the way a Redis client emits `error` for every
//! failed attempt, and the task tries again after a fixed pause. The
//! registry only ever sees the two lifecycle signals.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::RedisEngine;

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Time between `PING` health checks on an idle connection.
    pub health_check_interval: Duration,
    /// How long a `PING` may take before the connection is declared dead.
    pub ping_timeout: Duration,
    /// Bound on opening the socket and completing the handshake.
    pub connect_timeout: Duration,
    /// Bound on any single command reply, script calls included.
    pub response_timeout: Duration,
    /// Pause after a failed connect attempt.
    pub retry_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(5),
            ping_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Invalid Redis URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: redis::RedisError,
    },
}

#[derive(Debug)]
pub struct RedisSupervisor {
    client: redis::Client,
    config: ConnectionConfig,
}

impl RedisSupervisor {
    /// Validate `url` without connecting.
    pub fn new(url: &str, config: ConnectionConfig) -> Result<Self, SupervisorError> {
        let client = redis::Client::open(url).map_err(|source| SupervisorError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        Ok(Self { client, config })
    }

    /// Start supervising `engine` until `cancel` fires.
    pub fn spawn(self, engine: Arc<RedisEngine>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Starting Redis connection task");
            run_connection_loop(&self.client, &engine, &self.config, &cancel).await;
            engine.release().await;
            tracing::info!("Redis connection task exited");
        })
    }
}

/// Connect, watch, and start over whenever the connection is lost.
async fn run_connection_loop(
    client: &redis::Client,
    engine: &RedisEngine,
    config: &ConnectionConfig,
    cancel: &CancellationToken,
) {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = open(client, config) => result,
        };

        let conn = match result {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Redis connect attempt failed");
                engine.detach(e.to_string()).await;
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(config.retry_delay) => continue,
                }
            }
        };

        tracing::info!(attempt, "Connected to Redis");
        attempt = 0;
        engine.attach(conn.clone()).await;

        let Some(reason) = watch_connection(engine, conn, config, cancel).await else {
            return;
        };

        tracing::warn!(reason = %reason, "Redis connection lost");
        engine.detach(reason).await;
    }
}

async fn open(
    client: &redis::Client,
    config: &ConnectionConfig,
) -> redis::RedisResult<MultiplexedConnection> {
    client
        .get_multiplexed_async_connection_with_timeouts(
            config.response_timeout,
            config.connect_timeout,
        )
        .await
}

/// Health-check `conn` until it fails or `cancel` fires.
///
/// Returns the failure reason, or `None` on cancellation.
async fn watch_connection(
    engine: &RedisEngine,
    mut conn: MultiplexedConnection,
    config: &ConnectionConfig,
    cancel: &CancellationToken,
) -> Option<String> {
    let period = config.health_check_interval.max(Duration::from_millis(10));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            _ = engine.faults().notified() => {
                tracing::debug!("Transport fault reported, checking connection");
            }
            _ = interval.tick() => {}
        }

        if let Err(reason) = ping(&mut conn, config.ping_timeout).await {
            return Some(reason);
        }
    }
}

async fn ping(conn: &mut MultiplexedConnection, timeout: Duration) -> Result<(), String> {
    let result = tokio::time::timeout(timeout, async {
        let _pong: String = redis::cmd("PING").query_async(conn).await?;
        Ok::<(), redis::RedisError>(())
    })
    .await;

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_elapsed) => Err(format!("PING timed out after {}ms", timeout.as_millis())),
    }
}
