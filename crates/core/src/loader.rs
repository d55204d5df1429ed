//! Batch registration of scripts with the engine.
//!
//! [`register_scripts`] walks a [`ScriptMap`] in insertion order and issues
//! one registration at a time, waiting for each reply before sending the
//! next. The first failure ends the run and the digests collected so far
//! are dropped.

use crate::engine::ScriptEngine;
use crate::error::RegistrationError;
use crate::types::{DigestMap, ScriptMap};

/// Register every script in `scripts` and return the complete digest map.
pub async fn register_scripts<E>(
    engine: &E,
    scripts: &ScriptMap,
) -> Result<DigestMap, RegistrationError>
where
    E: ScriptEngine + ?Sized,
{
    let mut digests = DigestMap::with_capacity(scripts.len());

    for (name, text) in scripts {
        match engine.register(text).await {
            Ok(digest) => {
                tracing::debug!(name = %name, digest = %digest, "Registered script");
                digests.insert(name.clone(), digest);
            }
            Err(source) => {
                tracing::debug!(
                    name = %name,
                    registered = digests.len(),
                    remaining = scripts.len() - digests.len() - 1,
                    "Aborting registration run",
                );
                return Err(RegistrationError {
                    name: name.clone(),
                    source,
                });
            }
        }
    }

    Ok(digests)
}
