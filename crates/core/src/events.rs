//! Diagnostic events published by a [`ScriptRegistry`](crate::registry::ScriptRegistry).
//!
//! Background registration never reports back to the caller that started
//! it. Its outcome, and every cache invalidation, is broadcast here instead.
//! Call [`ScriptRegistry::subscribe`](crate::registry::ScriptRegistry::subscribe)
//! to receive them.

use serde::Serialize;

use crate::error::RegistrationError;

/// Broadcast channel capacity for registry events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// What started a registration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadTrigger {
    /// An explicit `load` call; the run covers only the scripts it supplied.
    Load,
    /// A `Connected` signal; the run covers the whole script store.
    Reconnect,
}

#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A registration run finished and its digests were merged.
    ScriptsRegistered {
        trigger: LoadTrigger,
        names: Vec<String>,
    },

    /// A registration run aborted. None of its digests were merged.
    ///
    /// `names` lists every script the run covered, not just the one that
    /// failed.
    RegistrationFailed {
        trigger: LoadTrigger,
        names: Vec<String>,
        error: RegistrationError,
    },

    /// The digest cache was emptied after a connection error.
    DigestsCleared { discarded: usize, reason: String },
}
