//! Reading script source text from disk.
//!
//! Directory listings are sorted by file name so that the registration
//! order of a directory load does not depend on the filesystem.

use std::path::{Path, PathBuf};

use crate::error::RegistryError;
use crate::types::ScriptMap;

/// Suffix stripped from file names to derive script names.
pub const SCRIPT_EXTENSION: &str = ".lua";

/// Derive a script name from a file name (`read-write.lua` -> `read-write`).
pub fn script_name(file_name: &str) -> &str {
    file_name
        .strip_suffix(SCRIPT_EXTENSION)
        .unwrap_or(file_name)
}

pub async fn read_script_file(path: &Path) -> Result<String, RegistryError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| source_error(path, source))
}

/// Read every regular file in `dir` into a [`ScriptMap`].
///
/// Subdirectories are skipped, as are files whose names are not valid
/// UTF-8 or reduce to an empty script name.
pub async fn read_script_dir(dir: &Path) -> Result<ScriptMap, RegistryError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|source| source_error(dir, source))?;

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| source_error(dir, source))?
    {
        let path = entry.path();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|source| source_error(&path, source))?;
        if !metadata.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(file_name) => files.push((file_name, path)),
            Err(raw) => {
                tracing::warn!(file_name = ?raw, "Skipping script file with non UTF-8 name");
            }
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut scripts = ScriptMap::with_capacity(files.len());
    for (file_name, path) in files {
        let name = script_name(&file_name);
        if name.is_empty() {
            tracing::warn!(path = %path.display(), "Skipping script file with empty name");
            continue;
        }
        let text = read_script_file(&path).await?;
        scripts.insert(name.to_string(), text);
    }

    tracing::debug!(dir = %dir.display(), count = scripts.len(), "Read script directory");
    Ok(scripts)
}

fn source_error(path: &Path, source: std::io::Error) -> RegistryError {
    RegistryError::Source {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn script_name_strips_extension() {
        assert_eq!(script_name("read-write.lua"), "read-write");
        assert_eq!(script_name("plain"), "plain");
        assert_eq!(script_name("archive.lua.bak"), "archive.lua.bak");
    }

    #[tokio::test]
    async fn reads_directory_sorted_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zeta.lua"), "return 'z'").unwrap();
        std::fs::write(dir.path().join("alpha.lua"), "return 'a'").unwrap();
        std::fs::write(dir.path().join("notes"), "return 'n'").unwrap();
        std::fs::create_dir(dir.path().join("nested.lua")).unwrap();

        let scripts = read_script_dir(dir.path()).await.unwrap();

        assert_eq!(
            scripts.keys().collect::<Vec<_>>(),
            vec!["alpha", "notes", "zeta"]
        );
        assert_eq!(scripts["zeta"], "return 'z'");
    }

    #[tokio::test]
    async fn skips_file_with_empty_script_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".lua"), "return 0").unwrap();
        std::fs::write(dir.path().join("one.lua"), "return 1").unwrap();

        let scripts = read_script_dir(dir.path()).await.unwrap();

        assert_eq!(scripts.keys().collect::<Vec<_>>(), vec!["one"]);
    }

    #[tokio::test]
    async fn missing_directory_is_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        assert_matches!(
            read_script_dir(&missing).await,
            Err(RegistryError::Source { path, .. }) if path == missing
        );
    }

    #[tokio::test]
    async fn missing_file_is_source_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            read_script_file(&dir.path().join("gone.lua")).await,
            Err(RegistryError::Source { .. })
        );
    }
}
