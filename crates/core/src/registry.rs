//! The script registry: public entry point for loading and running scripts.
//!
//! [`ScriptRegistry`] owns a [`ScriptStore`], a [`DigestCache`] and a
//! lifecycle reactor task subscribed to its engine. Loads are
//! fire-and-forget: the scripts land in the store immediately and their
//! digests arrive in the cache once a background registration run
//! completes. [`ScriptRegistry::run`] prefers the digest and falls back to
//! the full text while no digest is cached.
//!
//! The registry is meant to be created once per engine connection and
//! dropped with it. Dropping it (or calling
//! [`shutdown`](ScriptRegistry::shutdown)) stops the reactor and any
//! registration still in flight.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::cache::DigestCache;
use crate::engine::ScriptEngine;
use crate::error::RegistryError;
use crate::events::{LoadTrigger, RegistryEvent, EVENT_CHANNEL_CAPACITY};
use crate::loader::register_scripts;
use crate::reactor;
use crate::source;
use crate::store::{collect_scripts, ScriptStore};
use crate::types::{Invocation, ScriptDigest, ScriptMap, ScriptRef};

/// State shared between the registry handle, the reactor task and
/// background registration runs.
pub(crate) struct Shared<E: ScriptEngine> {
    pub(crate) engine: Arc<E>,
    pub(crate) store: ScriptStore,
    pub(crate) cache: DigestCache,
    events: broadcast::Sender<RegistryEvent>,
}

impl<E: ScriptEngine> Shared<E> {
    /// Run the Loader Protocol over `scripts` on a background task.
    pub(crate) fn spawn_registration(
        self: &Arc<Self>,
        scripts: ScriptMap,
        trigger: LoadTrigger,
        cancel: CancellationToken,
    ) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(trigger = ?trigger, "Registration run cancelled");
                }
                _ = shared.register_and_merge(scripts, trigger) => {}
            }
        });
    }

    async fn register_and_merge(&self, scripts: ScriptMap, trigger: LoadTrigger) {
        match register_scripts(self.engine.as_ref(), &scripts).await {
            Ok(digests) => {
                let names: Vec<String> = digests.keys().cloned().collect();
                self.cache.merge(digests).await;
                tracing::info!(trigger = ?trigger, count = names.len(), "Script digests cached");
                let _ = self
                    .events
                    .send(RegistryEvent::ScriptsRegistered { trigger, names });
            }
            Err(error) => {
                tracing::warn!(
                    trigger = ?trigger,
                    name = %error.name,
                    error = %error.source,
                    "Script registration failed, digests from this run discarded",
                );
                let names = scripts.keys().cloned().collect();
                let _ = self.events.send(RegistryEvent::RegistrationFailed {
                    trigger,
                    names,
                    error,
                });
            }
        }
    }

    pub(crate) async fn clear_digests(&self, reason: &str) {
        let discarded = self.cache.clear().await;
        tracing::info!(discarded, reason = %reason, "Cleared script digests after connection error");
        let _ = self.events.send(RegistryEvent::DigestsCleared {
            discarded,
            reason: reason.to_string(),
        });
    }
}

/// Client-side registry of named scripts and their engine digests.
pub struct ScriptRegistry<E: ScriptEngine> {
    shared: Arc<Shared<E>>,
    /// Cancelled on shutdown; stops the reactor and pending registrations.
    cancel: CancellationToken,
}

impl<E: ScriptEngine> ScriptRegistry<E> {
    /// Create a registry and subscribe it to `engine`'s lifecycle signals.
    ///
    /// Must be called from within a Tokio runtime. Signals raised before
    /// this call are not observed, so create the registry before the
    /// engine's connection is started.
    pub fn new(engine: Arc<E>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let signals = engine.subscribe();
        let shared = Arc::new(Shared {
            engine,
            store: ScriptStore::new(),
            cache: DigestCache::new(),
            events,
        });
        let cancel = CancellationToken::new();

        tokio::spawn(reactor::run(Arc::clone(&shared), signals, cancel.clone()));

        Self { shared, cancel }
    }

    /// Subscribe to registration outcomes and cache invalidations.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.shared.events.subscribe()
    }

    /// Add scripts to the store and register them in the background.
    ///
    /// Returns as soon as the store is updated. Only the supplied scripts
    /// are registered, not the whole store. The outcome is reported on
    /// [`subscribe`](Self::subscribe), never here.
    pub async fn load<I, K, V>(&self, scripts: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let scripts = collect_scripts(scripts);
        self.shared.store.put_all(&scripts).await?;

        if scripts.is_empty() {
            return Ok(());
        }
        tracing::info!(count = scripts.len(), "Loaded scripts");
        self.shared
            .spawn_registration(scripts, LoadTrigger::Load, self.cancel.clone());
        Ok(())
    }

    /// Load a single script from `path` under `name`.
    pub async fn load_from_file(
        &self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), RegistryError> {
        let text = source::read_script_file(path.as_ref()).await?;
        self.load([(name, text)]).await
    }

    /// Load every script file in `dir`, named by file name minus `.lua`.
    pub async fn load_from_dir(&self, dir: impl AsRef<Path>) -> Result<(), RegistryError> {
        let scripts = source::read_script_dir(dir.as_ref()).await?;
        self.load(scripts).await
    }

    /// Run `name` by digest if one is cached, otherwise by its full text.
    pub async fn run(
        &self,
        name: &str,
        keys: Vec<String>,
        args: Vec<String>,
    ) -> Result<E::Reply, RegistryError> {
        if let Some(digest) = self.shared.cache.get(name).await {
            return self
                .dispatch(name, ScriptRef::Digest(digest), keys, args)
                .await;
        }
        self.invoke_by_text(name, keys, args).await
    }

    /// Run `name` by submitting its full source text.
    pub async fn invoke_by_text(
        &self,
        name: &str,
        keys: Vec<String>,
        args: Vec<String>,
    ) -> Result<E::Reply, RegistryError> {
        let text = self
            .shared
            .store
            .get(name)
            .await
            .ok_or_else(|| RegistryError::ScriptNotFound(name.to_string()))?;
        self.dispatch(name, ScriptRef::Text(text), keys, args).await
    }

    /// Run `name` by its cached digest. Never falls back to text.
    pub async fn invoke_by_digest(
        &self,
        name: &str,
        keys: Vec<String>,
        args: Vec<String>,
    ) -> Result<E::Reply, RegistryError> {
        let digest = self
            .shared
            .cache
            .get(name)
            .await
            .ok_or_else(|| RegistryError::DigestNotCached(name.to_string()))?;
        self.dispatch(name, ScriptRef::Digest(digest), keys, args)
            .await
    }

    pub async fn script(&self, name: &str) -> Option<String> {
        self.shared.store.get(name).await
    }

    pub async fn digest(&self, name: &str) -> Option<ScriptDigest> {
        self.shared.cache.get(name).await
    }

    pub async fn script_count(&self) -> usize {
        self.shared.store.len().await
    }

    pub async fn digest_count(&self) -> usize {
        self.shared.cache.len().await
    }

    /// Stop the reactor and cancel registration runs still in flight.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!("Shutting down script registry");
            self.cancel.cancel();
        }
    }

    async fn dispatch(
        &self,
        name: &str,
        script: ScriptRef,
        keys: Vec<String>,
        args: Vec<String>,
    ) -> Result<E::Reply, RegistryError> {
        let by_digest = script.is_digest();
        let invocation = Invocation::new(script, keys, args);
        tracing::trace!(name, by_digest, num_keys = invocation.num_keys(), "Invoking script");

        self.shared.engine.invoke(invocation).await.map_err(|e| {
            tracing::debug!(name, by_digest, error = %e, "Script invocation failed");
            RegistryError::Remote(e)
        })
    }
}

impl<E: ScriptEngine> Drop for ScriptRegistry<E> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
