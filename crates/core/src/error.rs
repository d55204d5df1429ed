use std::path::PathBuf;

/// Failure reported by a [`ScriptEngine`](crate::engine::ScriptEngine).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// No live connection to the engine.
    #[error("Engine not connected")]
    NotConnected,

    /// The engine received the command and refused it (compile error,
    /// unknown digest, script runtime error).
    #[error("Engine rejected command: {0}")]
    Rejected(String),

    /// The command could not be delivered or its reply was lost.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// A Loader Protocol run aborted at `name`.
///
/// Never returned to a `load` caller; published on the registry's
/// diagnostic channel instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to register script '{name}': {source}")]
pub struct RegistrationError {
    pub name: String,
    #[source]
    pub source: EngineError,
}

/// Errors surfaced to callers of the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid script name: {0:?}")]
    InvalidName(String),

    #[error("NO_SUCH_SCRIPT: {0}")]
    ScriptNotFound(String),

    #[error("NO_SUCH_SCRIPT_SHA: {0}")]
    DigestNotCached(String),

    /// The engine rejected or failed the invocation. Passed through as-is.
    #[error("Remote invocation failed: {0}")]
    Remote(#[from] EngineError),

    #[error("Failed to read script source {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
