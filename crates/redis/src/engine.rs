//! Redis implementation of [`ScriptEngine`].
//!
//! Registration is `SCRIPT LOAD`, invocation is `EVAL` or `EVALSHA`. The
//! live connection is installed and removed by the
//! [`supervisor`](crate::supervisor), which also raises the lifecycle
//! signals this engine hands out through [`ScriptEngine::subscribe`].

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::{broadcast, Notify, RwLock};

use scripto_core::{EngineError, Invocation, LifecycleSignal, ScriptDigest, ScriptEngine};

/// Broadcast channel capacity for lifecycle signals.
const SIGNAL_CHANNEL_CAPACITY: usize = 64;

pub struct RedisEngine {
    /// `None` while disconnected.
    connection: RwLock<Option<MultiplexedConnection>>,
    signals: broadcast::Sender<LifecycleSignal>,
    /// Woken when a command fails at the transport level so the supervisor
    /// can health-check without waiting for the next interval.
    faults: Notify,
}

impl RedisEngine {
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        Self {
            connection: RwLock::new(None),
            signals,
            faults: Notify::new(),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.is_some()
    }

    /// Install a fresh connection and announce it.
    pub(crate) async fn attach(&self, connection: MultiplexedConnection) {
        *self.connection.write().await = Some(connection);
        let _ = self.signals.send(LifecycleSignal::Connected);
    }

    /// Drop the current connection and announce the failure.
    pub(crate) async fn detach(&self, reason: String) {
        *self.connection.write().await = None;
        let _ = self.signals.send(LifecycleSignal::ConnectionError(reason));
    }

    /// Drop the current connection without raising a signal (shutdown).
    pub(crate) async fn release(&self) {
        *self.connection.write().await = None;
    }

    pub(crate) fn faults(&self) -> &Notify {
        &self.faults
    }

    async fn connection(&self) -> Result<MultiplexedConnection, EngineError> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or(EngineError::NotConnected)
    }

    fn report(&self, err: redis::RedisError) -> EngineError {
        let err = classify(&err);
        if matches!(err, EngineError::Transport(_)) {
            self.faults.notify_one();
        }
        err
    }
}

impl Default for RedisEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScriptEngine for RedisEngine {
    type Reply = redis::Value;

    async fn register(&self, source: &str) -> Result<ScriptDigest, EngineError> {
        let mut conn = self.connection().await?;
        let sha: String = redis::cmd("SCRIPT")
            .arg("LOAD")
            .arg(source)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.report(e))?;
        Ok(ScriptDigest::new(sha))
    }

    async fn invoke(&self, invocation: Invocation) -> Result<redis::Value, EngineError> {
        let mut conn = self.connection().await?;
        let reply: redis::Value = invocation_command(&invocation)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.report(e))?;
        Ok(reply)
    }

    fn subscribe(&self) -> broadcast::Receiver<LifecycleSignal> {
        self.signals.subscribe()
    }
}

/// Build the `EVAL` / `EVALSHA` command for `invocation`.
pub fn invocation_command(invocation: &Invocation) -> redis::Cmd {
    let name = if invocation.script.is_digest() {
        "EVALSHA"
    } else {
        "EVAL"
    };
    let mut cmd = redis::cmd(name);
    cmd.arg(invocation.command_args());
    cmd
}

/// Split Redis failures into transport problems and command rejections.
///
/// Server replies such as `NOSCRIPT` or a Lua compile error are rejections
/// and are passed to the caller untouched.
pub fn classify(err: &redis::RedisError) -> EngineError {
    if err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
    {
        EngineError::Transport(err.to_string())
    } else {
        EngineError::Rejected(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use scripto_core::ScriptRef;

    use super::*;

    fn packed(cmd: &redis::Cmd) -> String {
        String::from_utf8(cmd.get_packed_command()).unwrap()
    }

    #[test]
    fn evalsha_for_digest_reference() {
        let inv = Invocation::new(
            ScriptRef::Digest(ScriptDigest::new("abc")),
            vec!["helloKey".into()],
            vec!["200".into()],
        );
        assert_eq!(
            packed(&invocation_command(&inv)),
            "*5\r\n$7\r\nEVALSHA\r\n$3\r\nabc\r\n$1\r\n1\r\n$8\r\nhelloKey\r\n$3\r\n200\r\n"
        );
    }

    #[test]
    fn eval_for_text_reference_with_no_keys() {
        let inv = Invocation::new(ScriptRef::Text("return 1000;".into()), vec![], vec![]);
        assert_eq!(
            packed(&invocation_command(&inv)),
            "*3\r\n$4\r\nEVAL\r\n$12\r\nreturn 1000;\r\n$1\r\n0\r\n"
        );
    }

    #[test]
    fn io_errors_are_transport() {
        let err = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        assert_matches!(classify(&err), EngineError::Transport(_));
    }

    #[test]
    fn server_errors_are_rejections() {
        let err = redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "NOSCRIPT No matching script",
        ));
        assert_matches!(classify(&err), EngineError::Rejected(msg) if msg.contains("NOSCRIPT"));
    }

    #[tokio::test]
    async fn calls_fail_fast_while_disconnected() {
        let engine = RedisEngine::new();

        assert_matches!(engine.register("return 1").await, Err(EngineError::NotConnected));
        assert!(!engine.is_connected().await);
    }

    #[tokio::test]
    async fn detach_raises_connection_error() {
        let engine = RedisEngine::new();
        let mut rx = engine.subscribe();

        engine.detach("ping timed out".into()).await;

        assert_eq!(
            rx.recv().await.unwrap(),
            LifecycleSignal::ConnectionError("ping timed out".into())
        );
    }

    #[tokio::test]
    async fn release_is_silent() {
        let engine = RedisEngine::new();
        let mut rx = engine.subscribe();

        engine.release().await;

        assert_matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        );
    }
}
