//! Shared value types for scripts, digests, and invocations.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Script name to source text, in insertion order.
///
/// Insertion order is the order in which a batch is registered with the
/// engine, so it is part of the observable behavior of a load.
pub type ScriptMap = IndexMap<String, String>;

/// Script name to engine-issued digest, in registration order.
pub type DigestMap = IndexMap<String, ScriptDigest>;

/// Opaque token issued by the engine for a registered script body.
///
/// Never computed locally; the registry only stores and forwards it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptDigest(String);

impl ScriptDigest {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an invocation refers to the script it executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptRef {
    /// Full source text (EVAL-style).
    Text(String),
    /// Previously registered digest (EVALSHA-style).
    Digest(ScriptDigest),
}

impl ScriptRef {
    pub fn is_digest(&self) -> bool {
        matches!(self, Self::Digest(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Digest(digest) => digest.as_str(),
        }
    }
}

/// A single request to execute a script on the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub script: ScriptRef,
    /// Leading arguments the engine treats as keys.
    pub keys: Vec<String>,
    /// Free-form arguments following the keys.
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(script: ScriptRef, keys: Vec<String>, args: Vec<String>) -> Self {
        Self { script, keys, args }
    }

    pub fn num_keys(&self) -> usize {
        self.keys.len()
    }

    /// Flatten into the positional form the engine expects:
    /// script reference, key count, keys, then args.
    pub fn command_args(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(2 + self.keys.len() + self.args.len());
        out.push(self.script.as_str().to_string());
        out.push(self.num_keys().to_string());
        out.extend(self.keys.iter().cloned());
        out.extend(self.args.iter().cloned());
        out
    }
}

/// Connection state change raised by the engine's connection layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// Fires on the initial connect and on every reconnect.
    Connected,
    /// The connection failed; carries a human-readable reason.
    ConnectionError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_args_orders_ref_count_keys_args() {
        let inv = Invocation::new(
            ScriptRef::Digest(ScriptDigest::new("abc123")),
            vec!["k1".into(), "k2".into()],
            vec!["200".into()],
        );
        assert_eq!(inv.command_args(), vec!["abc123", "2", "k1", "k2", "200"]);
    }

    #[test]
    fn empty_keys_contribute_zero_count() {
        let inv = Invocation::new(
            ScriptRef::Text("return 1000".into()),
            vec![],
            vec!["a".into()],
        );
        assert_eq!(inv.num_keys(), 0);
        assert_eq!(inv.command_args(), vec!["return 1000", "0", "a"]);
    }

    #[test]
    fn digest_serializes_as_plain_string() {
        let digest = ScriptDigest::new("e0e1f9fabfc9d4800c877a703b823ac0578ff831");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, "\"e0e1f9fabfc9d4800c877a703b823ac0578ff831\"");
        assert_eq!(digest.to_string(), digest.as_str());
    }

    #[test]
    fn script_ref_kind() {
        assert!(ScriptRef::Digest(ScriptDigest::new("x")).is_digest());
        assert!(!ScriptRef::Text("return 1".into()).is_digest());
    }
}
