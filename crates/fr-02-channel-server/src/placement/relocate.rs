//! Move a file without ever overwriting an existing one.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{clean, exists, wants_directory, PlacementError};

/// Move `source` to `target`.
///
/// - both paths must be absolute, `source` must exist
/// - a directory target (existing, or spelled with a trailing separator)
///   receives `basename(source)` and is created when missing
/// - an existing destination file is never replaced
/// - missing parent directories of a file target are created
///
/// Returns the final path.
pub fn move_file(source: &str, target: &str) -> Result<PathBuf, PlacementError> {
    let target_is_dir = wants_directory(target)?;
    let source = clean(Path::new(source));
    let target = clean(Path::new(target));

    if !source.is_absolute() {
        return Err(PlacementError::NotAbsolute(source));
    }
    if !target.is_absolute() {
        return Err(PlacementError::NotAbsolute(target));
    }
    if !exists(&source)? {
        return Err(PlacementError::SourceMissing(source));
    }

    let destination = if target_is_dir {
        let name = source
            .file_name()
            .ok_or_else(|| PlacementError::SourceMissing(source.clone()))?;
        let destination = target.join(name);
        if !exists(&target)? {
            fs::create_dir_all(&target)
                .map_err(|e| PlacementError::io("create directory", &target, e))?;
        } else if exists(&destination)? {
            return Err(PlacementError::TargetExists(destination));
        }
        destination
    } else {
        if exists(&target)? {
            return Err(PlacementError::TargetExists(target));
        }
        if let Some(parent) = target.parent() {
            if !exists(parent)? {
                fs::create_dir_all(parent)
                    .map_err(|e| PlacementError::io("create parent directory", parent, e))?;
            }
        }
        target
    };

    rename_or_copy(&source, &destination)?;
    debug!(from = %source.display(), to = %destination.display(), "file moved");
    Ok(destination)
}

/// `rename`, falling back to copy + remove across filesystems.
pub fn rename_or_copy(source: &Path, destination: &Path) -> Result<(), PlacementError> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            copy_exclusive(source, destination)?;
            fs::remove_file(source).map_err(|e| PlacementError::io("remove source", source, e))
        }
        Err(e) => Err(PlacementError::io("rename", source, e)),
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EXDEV)
    }
    #[cfg(windows)]
    {
        // ERROR_NOT_SAME_DEVICE
        err.raw_os_error() == Some(17)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = err;
        false
    }
}

/// Copy into a file that must not exist yet, keeping mode and mtime.
fn copy_exclusive(source: &Path, destination: &Path) -> Result<(), PlacementError> {
    let mut src = File::open(source).map_err(|e| PlacementError::io("open source", source, e))?;
    let meta = src
        .metadata()
        .map_err(|e| PlacementError::io("stat source", source, e))?;

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(meta.permissions().mode());
    }
    let mut dst = options.open(destination).map_err(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            PlacementError::TargetExists(destination.to_path_buf())
        } else {
            PlacementError::io("create destination", destination, e)
        }
    })?;

    if let Err(e) = io::copy(&mut src, &mut dst) {
        drop(dst);
        let _ = fs::remove_file(destination);
        return Err(PlacementError::io("copy", destination, e));
    }
    dst.sync_all()
        .map_err(|e| PlacementError::io("sync", destination, e))?;
    if let Ok(modified) = meta.modified() {
        if let Err(e) = dst.set_modified(modified) {
            warn!(path = %destination.display(), error = %e, "mtime not preserved");
        }
    }
    Ok(())
}
