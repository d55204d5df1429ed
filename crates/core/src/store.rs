//! In-memory script store: name to source text.
//!
//! Append/overwrite only. Nothing is ever removed for the lifetime of the
//! owning registry.

use tokio::sync::RwLock;

use crate::error::RegistryError;
use crate::types::ScriptMap;

#[derive(Debug, Default)]
pub struct ScriptStore {
    scripts: RwLock<ScriptMap>,
}

impl ScriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a single script.
    pub async fn put(&self, name: &str, text: &str) -> Result<(), RegistryError> {
        validate_name(name)?;
        self.scripts
            .write()
            .await
            .insert(name.to_string(), text.to_string());
        Ok(())
    }

    /// Merge a batch of scripts.
    ///
    /// Every name is validated before anything is written, so a batch with
    /// one bad name leaves the store untouched.
    pub async fn put_all(&self, scripts: &ScriptMap) -> Result<(), RegistryError> {
        for name in scripts.keys() {
            validate_name(name)?;
        }
        let mut guard = self.scripts.write().await;
        for (name, text) in scripts {
            guard.insert(name.clone(), text.clone());
        }
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<String> {
        self.scripts.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.scripts.read().await.contains_key(name)
    }

    /// Copy of the whole store, in first-insertion order.
    pub async fn snapshot(&self) -> ScriptMap {
        self.scripts.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.scripts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.scripts.read().await.is_empty()
    }
}

/// Collect `(name, text)` pairs into a [`ScriptMap`].
///
/// A later pair sharing a name with an earlier one overrides its text but
/// keeps the earlier position.
pub fn collect_scripts<I, K, V>(scripts: I) -> ScriptMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    scripts
        .into_iter()
        .map(|(name, text)| (name.into(), text.into()))
        .collect()
}

fn validate_name(name: &str) -> Result<(), RegistryError> {
    if name.is_empty() {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}
