//! The remote execution engine seam.
//!
//! [`ScriptEngine`] is everything the registry needs from the engine:
//! register a script body and get a digest back, invoke by text or by
//! digest, and a subscription to connection lifecycle signals. Connection
//! management, retries and transport live behind the implementation.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::EngineError;
use crate::types::{Invocation, LifecycleSignal, ScriptDigest};

#[async_trait]
pub trait ScriptEngine: Send + Sync + 'static {
    /// Reply value produced by a successful invocation.
    type Reply: Send + 'static;

    /// Submit `source` to the engine and return the digest it issues.
    async fn register(&self, source: &str) -> Result<ScriptDigest, EngineError>;

    /// Execute a script by text or digest.
    async fn invoke(&self, invocation: Invocation) -> Result<Self::Reply, EngineError>;

    /// Receive `Connected` / `ConnectionError` signals from now on.
    fn subscribe(&self) -> broadcast::Receiver<LifecycleSignal>;
}
