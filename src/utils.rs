//! Utility functions for file operations and path manipulation

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Maximum number of suffix attempts when resolving file collisions
const MAX_SUFFIX_ATTEMPTS: u32 = 9999;

/// Get a collision-free path for a file, appending `_1`, `_2`, ... as needed
///
/// # Arguments
///
/// * `path` - The desired file path
///
/// # Returns
///
/// Returns the original path when nothing occupies it, otherwise the first
/// suffixed sibling (`stem_1.ext`, `stem_2.ext`, ...) that does not exist.
///
/// # Examples
///
/// ```
/// use dashboard_harvest::utils::unique_destination;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/RTO-A.xlsx");
/// let unique = unique_destination(path).unwrap();
/// // If /tmp/RTO-A.xlsx exists, returns /tmp/RTO-A_1.xlsx
/// // If that exists too, returns /tmp/RTO-A_2.xlsx, etc.
/// ```
pub fn unique_destination(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Destination {
            path: path.to_path_buf(),
            reason: "cannot extract file stem".to_string(),
        })?;

    let extension = path.extension().and_then(|e| e.to_str());

    let parent = path.parent().ok_or_else(|| Error::Destination {
        path: path.to_path_buf(),
        reason: "cannot extract parent directory".to_string(),
    })?;

    for i in 1..=MAX_SUFFIX_ATTEMPTS {
        let new_name = match extension {
            Some(ext) => format!("{stem}_{i}.{ext}"),
            None => format!("{stem}_{i}"),
        };
        let new_path = parent.join(new_name);
        if !new_path.exists() {
            return Ok(new_path);
        }
    }

    Err(Error::Destination {
        path: path.to_path_buf(),
        reason: format!("no free suffix after {MAX_SUFFIX_ATTEMPTS} attempts"),
    })
}

/// Move a file, falling back to copy + remove when rename cannot work
///
/// `rename` fails with `CrossesDevices` when source and destination live on
/// different filesystems (browser download dir on tmpfs, staging root on a
/// mounted volume is the common case here); that failure triggers the copy
/// path, every other failure is propagated as-is.
///
/// # Arguments
///
/// * `source` - The file to move
/// * `destination` - Where it should end up; the parent must already exist
pub fn move_file(source: &Path, destination: &Path) -> Result<()> {
    match std::fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            std::fs::copy(source, destination)?;
            std::fs::remove_file(source)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn unique_destination_nonexistent_file_returns_original() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("RTO-A.xlsx");

        assert_eq!(unique_destination(&path).unwrap(), path);
    }

    #[test]
    fn unique_destination_appends_numeric_suffixes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("RTO-A.xlsx");

        fs::write(&path, "original").unwrap();

        let unique = unique_destination(&path).unwrap();
        assert_eq!(unique, temp_dir.path().join("RTO-A_1.xlsx"));

        fs::write(&unique, "first").unwrap();
        let unique2 = unique_destination(&path).unwrap();
        assert_eq!(unique2, temp_dir.path().join("RTO-A_2.xlsx"));
    }

    #[test]
    fn unique_destination_without_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("export");

        fs::write(&path, "original").unwrap();

        let unique = unique_destination(&path).unwrap();
        assert_eq!(unique, temp_dir.path().join("export_1"));
    }

    #[test]
    fn unique_destination_multiple_dots_suffixes_before_last_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.2025.xlsx");

        fs::write(&path, "original").unwrap();

        let unique = unique_destination(&path).unwrap();
        assert_eq!(unique, temp_dir.path().join("report.2025_1.xlsx"));
    }

    #[test]
    fn unique_destination_skips_occupied_suffixes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("RTO-A.xlsx");

        fs::write(&path, "original").unwrap();
        fs::write(temp_dir.path().join("RTO-A_1.xlsx"), "first").unwrap();
        fs::write(temp_dir.path().join("RTO-A_2.xlsx"), "second").unwrap();

        let unique = unique_destination(&path).unwrap();
        assert_eq!(unique, temp_dir.path().join("RTO-A_3.xlsx"));
    }

    #[test]
    fn move_file_preserves_content_and_removes_source() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("incoming.xlsx");
        let destination = temp_dir.path().join("staged.xlsx");

        fs::write(&source, "spreadsheet bytes").unwrap();
        move_file(&source, &destination).unwrap();

        assert!(!source.exists(), "source must be gone after the move");
        assert_eq!(fs::read_to_string(&destination).unwrap(), "spreadsheet bytes");
    }

    #[test]
    fn move_file_missing_source_propagates_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("never-downloaded.xlsx");
        let destination = temp_dir.path().join("staged.xlsx");

        let error = move_file(&source, &destination).expect_err("missing source must fail");
        assert!(matches!(error, Error::Io(_)), "got: {error:?}");
    }

    // --- unique_destination permission edge cases (Linux only) ---

    #[cfg(unix)]
    #[test]
    fn unique_destination_on_untraversable_directory_returns_original_path() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let restricted_dir = temp_dir.path().join("noperm");
        fs::create_dir(&restricted_dir).unwrap();

        // Create a file inside the directory BEFORE removing permissions
        let file_path = restricted_dir.join("existing.xlsx");
        fs::write(&file_path, "data").unwrap();

        // Removing execute permission on the directory makes stat() fail
        // for files inside it
        fs::set_permissions(&restricted_dir, fs::Permissions::from_mode(0o000)).unwrap();

        // Ensure cleanup happens even if assertions panic
        struct RestorePerms<'a>(&'a std::path::Path);
        impl Drop for RestorePerms<'_> {
            fn drop(&mut self) {
                let _ = fs::set_permissions(self.0, fs::Permissions::from_mode(0o755));
            }
        }
        let _guard = RestorePerms(&restricted_dir);

        // path.exists() returns false when the parent directory lacks execute
        // permission, so the collision goes unseen and the original path
        // comes back unchanged
        let result = unique_destination(&file_path).unwrap();
        assert_eq!(
            result, file_path,
            "with no directory traverse permission, exists() returns false, \
             so the occupied path is returned as if it were free"
        );
    }
}
