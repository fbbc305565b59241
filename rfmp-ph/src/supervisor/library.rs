//! Music directory resolution and audio file discovery

use crate::error::SupervisorError;
use std::path::{Path, PathBuf};

/// Resolve a requested directory against the music root
///
/// Absolute paths are used as-is; relative paths are joined onto `music_root`.
pub fn resolve_directory(music_root: &Path, requested: &str) -> Result<PathBuf, SupervisorError> {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Err(SupervisorError::BadRequest("directory is empty".to_string()));
    }

    let path = Path::new(trimmed);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(music_root.join(path))
    }
}

/// List playable files directly under `dir` (no recursion), sorted by path
///
/// Fails with `DirectoryInvalid` when the directory does not exist, is not a
/// directory, or contains no file with the configured extension.
pub async fn discover_audio_files(
    dir: &Path,
    requested: &str,
    extension: &str,
) -> Result<Vec<PathBuf>, SupervisorError> {
    let invalid = |reason: String| SupervisorError::DirectoryInvalid {
        directory: requested.to_string(),
        reason,
    };

    let metadata = tokio::fs::metadata(dir)
        .await
        .map_err(|e| invalid(format!("cannot access {}: {}", dir.display(), e)))?;
    if !metadata.is_dir() {
        return Err(invalid(format!("{} is not a directory", dir.display())));
    }

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| invalid(format!("cannot read {}: {}", dir.display(), e)))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| invalid(format!("cannot read {}: {}", dir.display(), e)))?
    {
        let path = entry.path();
        if !has_extension(&path, extension) {
            continue;
        }
        // Follows symlinks
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => files.push(path),
            _ => continue,
        }
    }

    if files.is_empty() {
        return Err(invalid(format!("no .{} files", extension)));
    }

    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}
