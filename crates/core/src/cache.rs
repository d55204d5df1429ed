//! In-memory digest cache: name to engine-issued digest.
//!
//! A passive map. Entries are only added by successful registration runs
//! and only removed all at once by [`DigestCache::clear`].

use tokio::sync::RwLock;

use crate::types::{DigestMap, ScriptDigest};

#[derive(Debug, Default)]
pub struct DigestCache {
    digests: RwLock<DigestMap>,
}

impl DigestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, name: &str) -> Option<ScriptDigest> {
        self.digests.read().await.get(name).cloned()
    }

    /// Add or overwrite every entry of `digests` under a single write lock.
    pub async fn merge(&self, digests: DigestMap) {
        let mut guard = self.digests.write().await;
        for (name, digest) in digests {
            guard.insert(name, digest);
        }
    }

    /// Drop every entry. Returns how many were discarded.
    pub async fn clear(&self) -> usize {
        let mut guard = self.digests.write().await;
        let discarded = guard.len();
        guard.clear();
        discarded
    }

    pub async fn len(&self) -> usize {
        self.digests.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.digests.read().await.is_empty()
    }
}
