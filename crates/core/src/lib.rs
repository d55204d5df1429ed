//! Client-side script registry with engine-issued digest caching.
//!
//! Scripts are loaded by name into an in-memory store and registered with a
//! remote [`ScriptEngine`] in the background. Once a digest is cached,
//! [`ScriptRegistry::run`] invokes by digest instead of resubmitting the
//! full text. A lifecycle reactor keeps the cache honest across connection
//! drops: every connection error clears it and every (re)connect rebuilds
//! it from the store.
//!
//! - [`ScriptRegistry`] - load / run / invoke-by-text / invoke-by-digest.
//! - [`ScriptEngine`] - the seam to the remote engine.
//! - [`RegistryEvent`] - diagnostic channel for background registration.

pub mod cache;
pub mod engine;
pub mod error;
pub mod events;
pub mod loader;
pub mod reactor;
pub mod registry;
pub mod source;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::ScriptEngine;
pub use error::{EngineError, RegistrationError, RegistryError};
pub use events::{LoadTrigger, RegistryEvent};
pub use registry::ScriptRegistry;
pub use types::{DigestMap, Invocation, LifecycleSignal, ScriptDigest, ScriptMap, ScriptRef};
