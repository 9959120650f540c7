//! # File Placement
//!
//! Filesystem side of the upload and move routes. Everything here is
//! blocking `std::fs`; handlers run it on the blocking pool.
//!
//! ```text
//! upload ──stream──→ <temp_root>/fleet-relay/tmp/<id>/<id>.tmp
//!                         │
//!   target exists? ──yes──→ move original aside into the staging dir
//!                         │
//!   move staged file onto target ──fail──→ move original back
//! ```

mod relocate;
mod upload;

pub use relocate::{move_file, rename_or_copy};
pub use upload::replace_path;

use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Directory under the temp root owned by this program.
pub const STAGING_DIR: &str = "fleet-relay";

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("target path or file name is empty")]
    EmptyTarget,

    #[error("path must be absolute: {}", .0.display())]
    NotAbsolute(PathBuf),

    #[error("source does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("target already exists: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("target is a directory, cannot replace it with a file: {}", .0.display())]
    TargetIsDirectory(PathBuf),

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PlacementError {
    pub(crate) fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        PlacementError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Per-upload scratch directory, removed on drop when empty.
///
/// A backed-up original that could not be restored stays behind so it is
/// never lost.
#[derive(Debug)]
pub struct Staging {
    dir: PathBuf,
    upload: PathBuf,
}

impl Staging {
    pub fn create(temp_root: &Path) -> Result<Self, PlacementError> {
        let id = Uuid::new_v4().simple().to_string();
        let dir = temp_root.join(STAGING_DIR).join("tmp").join(&id);
        std::fs::create_dir_all(&dir)
            .map_err(|e| PlacementError::io("create staging dir", &dir, e))?;
        let upload = dir.join(format!("{id}.tmp"));
        Ok(Self { dir, upload })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the uploaded bytes are written.
    pub fn upload_path(&self) -> &Path {
        &self.upload
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.upload) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.upload.display(), error = %e, "staged upload not removed");
            }
        }
        if let Err(e) = std::fs::remove_dir(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "staging dir not removed");
        }
    }
}

/// Lexical normalization: drops `.`, resolves `..`, strips trailing
/// separators. Does not touch the filesystem.
pub(crate) fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// An existing directory, or a missing path spelled with a trailing
/// separator.
pub(crate) fn wants_directory(path: &str) -> Result<bool, PlacementError> {
    if path.is_empty() {
        return Ok(false);
    }
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Ok(path.ends_with('/') || path.ends_with('\\'))
        }
        Err(e) => Err(PlacementError::io("inspect", Path::new(path), e)),
    }
}

pub(crate) fn exists(path: &Path) -> Result<bool, PlacementError> {
    path.try_exists()
        .map_err(|e| PlacementError::io("inspect", path, e))
}
