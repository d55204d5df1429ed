//! In-memory [`ScriptEngine`] used by the unit tests.
//!
//! Programs are keyed by their exact source text. Digests are the SHA-256 of
//! the text, mirroring how a real engine derives them from content.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::{broadcast, watch};

use crate::engine::ScriptEngine;
use crate::error::EngineError;
use crate::types::{Invocation, LifecycleSignal, ScriptDigest, ScriptRef};

/// Capacity of the fake's lifecycle signal channel.
pub const SIGNAL_CAPACITY: usize = 16;

type Program = Arc<dyn Fn(&[String], &[String]) -> Result<Value, EngineError> + Send + Sync>;

/// One remote call observed by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Register(String),
    EvalText(String),
    EvalDigest(ScriptDigest),
}

pub struct FakeEngine {
    programs: Mutex<HashMap<String, Program>>,
    rejected: Mutex<HashSet<String>>,
    registered: Mutex<HashMap<ScriptDigest, String>>,
    calls: Mutex<Vec<Call>>,
    gate: watch::Sender<bool>,
    signals: broadcast::Sender<LifecycleSignal>,
}

impl FakeEngine {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            programs: Mutex::new(HashMap::new()),
            rejected: Mutex::new(HashSet::new()),
            registered: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            gate,
            signals,
        }
    }

    /// Teach the engine how to execute `text`.
    pub fn with_program<F>(self, text: &str, program: F) -> Self
    where
        F: Fn(&[String], &[String]) -> Result<Value, EngineError> + Send + Sync + 'static,
    {
        self.programs
            .lock()
            .unwrap()
            .insert(text.to_string(), Arc::new(program));
        self
    }

    /// Make registration of `text` fail as a compile error would.
    pub fn rejecting(self, text: &str) -> Self {
        self.rejected.lock().unwrap().insert(text.to_string());
        self
    }

    /// Park every registration until [`release_registrations`](Self::release_registrations).
    pub fn hold_registrations(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_registrations(&self) {
        self.gate.send_replace(true);
    }

    /// Simulate an engine-side restart that loses registered scripts.
    pub fn forget_digests(&self) {
        self.registered.lock().unwrap().clear();
    }

    pub fn connect(&self) {
        let _ = self.signals.send(LifecycleSignal::Connected);
    }

    pub fn fail(&self, reason: &str) {
        let _ = self
            .signals
            .send(LifecycleSignal::ConnectionError(reason.to_string()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn digest_of(text: &str) -> ScriptDigest {
        ScriptDigest::new(format!("{:x}", Sha256::digest(text.as_bytes())))
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn program_for(&self, text: &str) -> Result<Program, EngineError> {
        self.programs
            .lock()
            .unwrap()
            .get(text)
            .cloned()
            .ok_or_else(|| EngineError::Rejected("ERR Error compiling script".into()))
    }
}

#[async_trait]
impl ScriptEngine for FakeEngine {
    type Reply = Value;

    async fn register(&self, source: &str) -> Result<ScriptDigest, EngineError> {
        self.record(Call::Register(source.to_string()));

        let mut open = self.gate.subscribe();
        open.wait_for(|ready| *ready)
            .await
            .map_err(|_| EngineError::NotConnected)?;

        if self.rejected.lock().unwrap().contains(source) {
            return Err(EngineError::Rejected("ERR Error compiling script".into()));
        }

        let digest = Self::digest_of(source);
        self.registered
            .lock()
            .unwrap()
            .insert(digest.clone(), source.to_string());
        Ok(digest)
    }

    async fn invoke(&self, invocation: Invocation) -> Result<Value, EngineError> {
        let text = match &invocation.script {
            ScriptRef::Text(text) => {
                self.record(Call::EvalText(text.clone()));
                text.clone()
            }
            ScriptRef::Digest(digest) => {
                self.record(Call::EvalDigest(digest.clone()));
                self.registered
                    .lock()
                    .unwrap()
                    .get(digest)
                    .cloned()
                    .ok_or_else(|| {
                        EngineError::Rejected("NOSCRIPT No matching script".into())
                    })?
            }
        };
        let program = self.program_for(&text)?;
        program(&invocation.keys, &invocation.args)
    }

    fn subscribe(&self) -> broadcast::Receiver<LifecycleSignal> {
        self.signals.subscribe()
    }
}

/// `return ARGV[1]*2`
pub const DOUBLE: &str = "return ARGV[1]*2";

/// `return ARGV[1]*2`, executed.
pub fn double(_keys: &[String], args: &[String]) -> Result<Value, EngineError> {
    let n: i64 = args
        .first()
        .and_then(|a| a.parse().ok())
        .ok_or_else(|| EngineError::Rejected("ERR bad argument".into()))?;
    Ok(Value::from(n * 2))
}

/// A fake that knows [`DOUBLE`] plus constant-returning scripts.
pub fn engine_with_double() -> FakeEngine {
    FakeEngine::new().with_program(DOUBLE, double)
}
