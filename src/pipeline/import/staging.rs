use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::ImportError;

/// Maximum length of the sanitized part of a staged filename.
const MAX_FILENAME_CHARS: usize = 100;

/// A file in the staging directory, removed when dropped.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    /// Take ownership of an existing staged path.
    pub fn adopt(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Staged file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove staged file"
            ),
        }
    }
}

/// Write `bytes` into `staging_dir` as `<uuid>_<sanitized filename>`.
///
/// The random prefix keeps concurrent requests carrying the same filename apart.
pub fn stage_bytes(
    staging_dir: &Path,
    filename: &str,
    bytes: &[u8],
) -> Result<StagedFile, ImportError> {
    std::fs::create_dir_all(staging_dir)?;

    let target = staging_dir.join(format!("{}_{}", Uuid::new_v4(), sanitize_filename(filename)));
    std::fs::write(&target, bytes)?;

    tracing::debug!(
        path = %target.display(),
        size = bytes.len(),
        "File staged"
    );

    Ok(StagedFile::adopt(target))
}

/// Reduce a client-supplied filename to a safe single path component.
pub fn sanitize_filename(name: &str) -> String {
    // Remove path separators and null bytes, replace other special chars
    let sanitized: String = name
        .chars()
        .filter(|&c| c != '/' && c != '\\' && c != '\0')
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Remove consecutive dots (path traversal prevention)
    let sanitized = sanitized.replace("..", "");

    let sanitized: String = sanitized.chars().take(MAX_FILENAME_CHARS).collect();

    if sanitized.trim_matches('.').is_empty() {
        "document".into()
    } else {
        sanitized
    }
}
