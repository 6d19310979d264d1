//! On-disk management of the quarantine encryption key.

use std::path::{Path, PathBuf};

use crate::crypto::{generate_key, KEY_LEN};
use crate::error::{QuarantineError, Result};

/// Loads the quarantine key from `<root>/encryption.key`, generating one
/// with secure randomness on first use.
///
/// # Errors
///
/// [`QuarantineError::InvalidKeyFile`] if an existing key file is not
/// exactly [`KEY_LEN`] bytes.
pub fn load_or_create(root: &Path) -> Result<[u8; KEY_LEN]> {
    let path = key_path(root);
    if path.exists() {
        let bytes = std::fs::read(&path)?;
        let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            QuarantineError::InvalidKeyFile(format!(
                "expected {KEY_LEN} bytes, found {}",
                bytes.len()
            ))
        })?;
        Ok(key)
    } else {
        let key = generate_key();
        write_key_file(&path, &key)?;
        Ok(key)
    }
}

#[must_use]
pub fn key_path(root: &Path) -> PathBuf {
    root.join("encryption.key")
}

#[cfg(unix)]
fn write_key_file(path: &Path, key: &[u8; KEY_LEN]) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, key)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn write_key_file(path: &Path, key: &[u8; KEY_LEN]) -> Result<()> {
    std::fs::write(path, key)?;
    Ok(())
}

#[cfg(unix)]
pub fn secure_directory(root: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::create_dir_all(root)?;
    std::fs::set_permissions(root, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
pub fn secure_directory(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root)?;
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[test]
    fn first_load_generates_key_with_0600_permissions() {
        let dir = tempdir().unwrap();
        secure_directory(dir.path()).unwrap();
        let key = load_or_create(dir.path()).unwrap();

        let meta = std::fs::metadata(key_path(dir.path())).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        assert_eq!(key.len(), KEY_LEN);
    }

    #[test]
    fn second_load_returns_same_key() {
        let dir = tempdir().unwrap();
        secure_directory(dir.path()).unwrap();
        let first = load_or_create(dir.path()).unwrap();
        let second = load_or_create(dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn directory_has_0700_permissions() {
        let dir = tempdir().unwrap();
        secure_directory(dir.path()).unwrap();
        let meta = std::fs::metadata(dir.path()).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn corrupt_key_file_length_is_rejected() {
        let dir = tempdir().unwrap();
        secure_directory(dir.path()).unwrap();
        std::fs::write(key_path(dir.path()), b"too-short").unwrap();
        assert!(load_or_create(dir.path()).is_err());
    }
}
