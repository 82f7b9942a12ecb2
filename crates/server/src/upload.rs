use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Owns a transient uploaded file. The file is removed when the guard is
/// dropped, which covers every exit path through a handler — normal
/// return, early return, or error.
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// Write upload bytes into `upload_dir` under a collision-free name.
    pub fn save(upload_dir: &Path, original_name: &str, data: &[u8]) -> std::io::Result<Self> {
        let path = upload_dir.join(format!("{}_{}", Uuid::new_v4(), sanitize(original_name)));
        std::fs::write(&path, data)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove uploaded file"
                );
            }
        }
    }
}

/// Keep only filename-safe characters; path separators never survive.
fn sanitize(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if kept.is_empty() {
        "upload".into()
    } else {
        kept
    }
}
