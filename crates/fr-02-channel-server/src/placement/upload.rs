//! Upload-and-replace.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{move_file, wants_directory, PlacementError, Staging};

/// Put the staged upload at `to_path`, replacing an existing file.
///
/// A directory `to_path` receives the upload as `to_path/file_name`. Only the
/// last component of `file_name` is used. If the final move fails, the
/// original file is moved back.
pub fn replace_path(
    staging: &Staging,
    file_name: &str,
    to_path: &str,
) -> Result<PathBuf, PlacementError> {
    let file_name = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    if to_path.is_empty() || file_name.is_empty() {
        return Err(PlacementError::EmptyTarget);
    }

    let destination = if wants_directory(to_path)? {
        Path::new(to_path).join(file_name)
    } else {
        PathBuf::from(to_path)
    };
    let destination_str = destination.to_string_lossy().into_owned();

    let backup = match std::fs::metadata(&destination) {
        Ok(meta) if meta.is_dir() => {
            return Err(PlacementError::TargetIsDirectory(destination));
        }
        Ok(_) => {
            let name = destination
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "original".into());
            let backup = staging.dir().join(name);
            move_file(&destination_str, &backup.to_string_lossy())?;
            Some(backup)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(PlacementError::io("inspect", &destination, e)),
    };

    match move_file(&staging.upload_path().to_string_lossy(), &destination_str) {
        Ok(placed) => {
            info!(path = %placed.display(), replaced = backup.is_some(), "upload placed");
            if let Some(backup) = backup {
                if let Err(e) = std::fs::remove_file(&backup) {
                    warn!(path = %backup.display(), error = %e, "replaced original not removed");
                }
            }
            Ok(placed)
        }
        Err(err) => {
            if let Some(backup) = backup {
                restore(&backup, &destination);
            }
            Err(err)
        }
    }
}

fn restore(backup: &Path, destination: &Path) {
    if destination.is_file() {
        if let Err(e) = std::fs::remove_file(destination) {
            warn!(path = %destination.display(), error = %e, "partial upload not removed");
        }
    }
    match move_file(&backup.to_string_lossy(), &destination.to_string_lossy()) {
        Ok(_) => info!(path = %destination.display(), "original restored"),
        Err(e) => warn!(
            backup = %backup.display(),
            path = %destination.display(),
            error = %e,
            "original not restored; it remains in the staging dir"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn stage(root: &Path, bytes: &[u8]) -> Staging {
        let staging = Staging::create(root).unwrap();
        fs::write(staging.upload_path(), bytes).unwrap();
        staging
    }

    #[test]
    fn test_replaces_existing_file() {
        let temp_root = tempfile::tempdir().unwrap();
        let deploy = tempfile::tempdir().unwrap();
        let target = deploy.path().join("app.conf");
        fs::write(&target, b"old").unwrap();

        let staging = stage(temp_root.path(), b"new");
        let placed = replace_path(&staging, "upload.bin", target.to_str().unwrap()).unwrap();

        assert_eq!(placed, target);
        assert_eq!(fs::read(&target).unwrap(), b"new");
        let staging_dir = staging.dir().to_path_buf();
        drop(staging);
        assert!(!staging_dir.exists());
    }

    #[test]
    fn test_directory_target_gets_file_name() {
        let temp_root = tempfile::tempdir().unwrap();
        let deploy = tempfile::tempdir().unwrap();
        let staging = stage(temp_root.path(), b"jar");

        let placed =
            replace_path(&staging, "../../service.jar", deploy.path().to_str().unwrap()).unwrap();
        assert_eq!(placed, deploy.path().join("service.jar"));
        assert_eq!(fs::read(&placed).unwrap(), b"jar");
    }

    #[test]
    fn test_existing_directory_target_rejected() {
        let temp_root = tempfile::tempdir().unwrap();
        let deploy = tempfile::tempdir().unwrap();
        fs::create_dir(deploy.path().join("service.jar")).unwrap();
        let staging = stage(temp_root.path(), b"jar");

        assert!(matches!(
            replace_path(&staging, "service.jar", deploy.path().to_str().unwrap()),
            Err(PlacementError::TargetIsDirectory(_))
        ));
    }

    #[test]
    fn test_empty_target_rejected() {
        let temp_root = tempfile::tempdir().unwrap();
        let staging = stage(temp_root.path(), b"x");
        assert!(matches!(
            replace_path(&staging, "a.txt", ""),
            Err(PlacementError::EmptyTarget)
        ));
        assert!(matches!(
            replace_path(&staging, "", "/tmp/x"),
            Err(PlacementError::EmptyTarget)
        ));
    }

    #[test]
    fn test_original_restored_when_final_move_fails() {
        let temp_root = tempfile::tempdir().unwrap();
        let deploy = tempfile::tempdir().unwrap();
        let target = deploy.path().join("app.conf");
        fs::write(&target, b"old").unwrap();

        let staging = stage(temp_root.path(), b"new");
        // Staged upload vanishes: the final move fails after the original was
        // moved aside.
        fs::remove_file(staging.upload_path()).unwrap();

        assert!(matches!(
            replace_path(&staging, "x", target.to_str().unwrap()),
            Err(PlacementError::SourceMissing(_))
        ));
        assert_eq!(fs::read(&target).unwrap(), b"old");
    }
}
