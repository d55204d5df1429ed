//! Connection lifecycle reactor.
//!
//! [`LifecycleReactor`] is a two-transition state machine over
//! [`LifecycleSignal`]s:
//!
//! - `Connected` -> [`ReactorAction::ReloadAll`]: re-register the entire
//!   script store and merge the digests.
//! - `ConnectionError` -> [`ReactorAction::ClearDigests`]: drop every cached
//!   digest. The script store is never touched.
//!
//! [`run`] drives the machine from the engine's signal channel for the
//! lifetime of the registry.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::engine::ScriptEngine;
use crate::events::LoadTrigger;
use crate::registry::Shared;
use crate::types::LifecycleSignal;

/// Connection state as last reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No signal received yet.
    #[default]
    AwaitingConnection,
    Connected,
    Disconnected,
}

/// Work the registry must perform in response to a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactorAction {
    ReloadAll,
    ClearDigests { reason: String },
}

#[derive(Debug, Default)]
pub struct LifecycleReactor {
    state: ConnectionState,
    connects: u64,
    errors: u64,
}

impl LifecycleReactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of `Connected` signals seen, initial connect included.
    pub fn connects(&self) -> u64 {
        self.connects
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn handle(&mut self, signal: LifecycleSignal) -> ReactorAction {
        match signal {
            LifecycleSignal::Connected => {
                self.state = ConnectionState::Connected;
                self.connects += 1;
                ReactorAction::ReloadAll
            }
            LifecycleSignal::ConnectionError(reason) => {
                self.state = ConnectionState::Disconnected;
                self.errors += 1;
                ReactorAction::ClearDigests { reason }
            }
        }
    }
}

/// Consume lifecycle signals until the channel closes or `cancel` fires.
///
/// A reload is handed off to a background task so that a hung registration
/// never delays a later `ConnectionError` from clearing the cache.
pub(crate) async fn run<E: ScriptEngine>(
    shared: Arc<Shared<E>>,
    mut signals: broadcast::Receiver<LifecycleSignal>,
    cancel: CancellationToken,
) {
    let mut reactor = LifecycleReactor::new();

    loop {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = signals.recv() => received,
        };

        match received {
            Ok(signal) => {
                tracing::debug!(?signal, "Lifecycle signal received");
                let action = reactor.handle(signal);
                apply(&shared, action, &cancel).await;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // The missed signals may have included an error. Any later
                // `Connected` is still in the channel and reloads on its own.
                tracing::warn!(skipped, "Lifecycle signals lagged, clearing digests");
                let action = reactor.handle(LifecycleSignal::ConnectionError(format!(
                    "{skipped} lifecycle signals missed"
                )));
                apply(&shared, action, &cancel).await;
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!("Lifecycle signal channel closed, reactor stopping");
                break;
            }
        }
    }

    tracing::debug!(
        connects = reactor.connects(),
        errors = reactor.errors(),
        "Lifecycle reactor exited",
    );
}

async fn apply<E: ScriptEngine>(
    shared: &Arc<Shared<E>>,
    action: ReactorAction,
    cancel: &CancellationToken,
) {
    match action {
        ReactorAction::ReloadAll => {
            let scripts = shared.store.snapshot().await;
            if scripts.is_empty() {
                tracing::debug!("Connected with an empty script store, nothing to reload");
                return;
            }
            tracing::info!(count = scripts.len(), "Reloading scripts after connect");
            shared.spawn_registration(scripts, LoadTrigger::Reconnect, cancel.clone());
        }
        ReactorAction::ClearDigests { reason } => {
            shared.clear_digests(&reason).await;
        }
    }
}
