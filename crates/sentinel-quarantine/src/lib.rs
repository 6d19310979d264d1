//! # Quarantine Manager
//!
//! Moves a dangerous file out of the user's reachable namespace into a
//! private, AES-256-CBC encrypted directory, recording enough to later
//! restore or permanently delete it. Content-addressed: a file already
//! quarantined under the same SHA-256 cannot be quarantined twice.

mod crypto;
mod error;
mod keyfile;
mod models;
mod storage;

pub use crypto::{KEY_LEN, IV_LEN};
pub use error::{QuarantineError, Result};
pub use models::{QuarantineRecord, ThreatLevel};

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Facade over the quarantine directory, its encryption key, and the
/// sled-backed record store.
pub struct QuarantineManager {
    root: PathBuf,
    key: [u8; KEY_LEN],
    storage: storage::Storage,
}

impl QuarantineManager {
    /// Opens (creating if needed) a quarantine root at `root`, securing
    /// its permissions and loading or generating its encryption key.
    ///
    /// # Errors
    ///
    /// Propagates IO, key-file, or backing-store failures.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        keyfile::secure_directory(&root)?;
        let key = keyfile::load_or_create(&root)?;
        let storage = storage::Storage::open(root.join("records.db"))?;
        Ok(Self { root, key, storage })
    }

    /// In-memory record store (still writes encrypted blobs to `root` on
    /// disk — quarantine content is never purely in-memory).
    ///
    /// # Errors
    ///
    /// Propagates IO or key-file failures.
    pub fn temporary(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        keyfile::secure_directory(&root)?;
        let key = keyfile::load_or_create(&root)?;
        let storage = storage::Storage::temporary()?;
        Ok(Self { root, key, storage })
    }

    /// Quarantines the file at `path`: reads it, rejects a duplicate by
    /// content hash, encrypts it into the quarantine directory, unlinks
    /// the original, and records the action.
    ///
    /// # Errors
    ///
    /// [`QuarantineError::AlreadyQuarantined`] if a live record already
    /// holds this content's hash. Propagates IO and backing-store errors.
    pub fn quarantine(
        &mut self,
        path: &Path,
        reason: impl Into<String>,
        threat_level: ThreatLevel,
        composite_score: f64,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<QuarantineRecord> {
        let bytes = std::fs::read(path)?;
        let hash = hex::encode(Sha256::digest(&bytes));

        if self.storage.find_by_hash(&hash)?.is_some() {
            return Err(QuarantineError::AlreadyQuarantined(hash));
        }

        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        let filename = format!(
            "{}_{}_{basename}.quar",
            now.format("%Y%m%d_%H%M%S"),
            &hash[..8]
        );
        let quarantine_path = self.root.join(&filename);

        let blob = crypto::encrypt(&self.key, &bytes);
        atomic_write(&quarantine_path, &blob)?;
        std::fs::remove_file(path)?;

        let record = QuarantineRecord {
            id: 0,
            original_path: path.to_string_lossy().into_owned(),
            quarantine_path: quarantine_path.to_string_lossy().into_owned(),
            reason: reason.into(),
            threat_level,
            composite_score,
            quarantined_at: now,
            size_bytes: bytes.len() as u64,
            sha256_hash: hash,
        };
        self.storage.insert(record)
    }

    /// Restores a quarantined file to `target_path`, decrypting its
    /// blob, then deletes the record and the encrypted blob.
    ///
    /// # Errors
    ///
    /// [`QuarantineError::NotFound`] if `id` has no live record.
    /// [`QuarantineError::CorruptBlob`] if the encrypted blob is missing
    /// or fails to decrypt.
    pub fn restore(&mut self, id: i64, target_path: &Path) -> Result<()> {
        let record = self.storage.get(id)?.ok_or(QuarantineError::NotFound(id))?;

        let blob = std::fs::read(&record.quarantine_path)
            .map_err(|_| QuarantineError::CorruptBlob(id))?;
        let plaintext =
            crypto::decrypt(&self.key, &blob).map_err(|_| QuarantineError::CorruptBlob(id))?;

        std::fs::write(target_path, plaintext)?;
        std::fs::remove_file(&record.quarantine_path).ok();
        self.storage.remove(id)?;
        Ok(())
    }

    /// Permanently deletes a quarantined file: unlinks its blob and
    /// drops the record.
    ///
    /// # Errors
    ///
    /// [`QuarantineError::NotFound`] if `id` has no live record.
    pub fn delete(&mut self, id: i64) -> Result<()> {
        let record = self.storage.remove(id)?.ok_or(QuarantineError::NotFound(id))?;
        std::fs::remove_file(&record.quarantine_path).ok();
        Ok(())
    }

    /// Deletes records (and their blobs) quarantined before `now - retention`.
    /// Returns the count removed.
    ///
    /// # Errors
    ///
    /// Propagates backing-store errors.
    pub fn cleanup_expired(
        &mut self,
        retention: chrono::Duration,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<usize> {
        let mut removed = 0;
        for record in self.storage.list()? {
            if record.quarantined_at + retention < now {
                std::fs::remove_file(&record.quarantine_path).ok();
                self.storage.remove(record.id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn get(&self, id: i64) -> Result<Option<QuarantineRecord>> {
        self.storage.get(id)
    }

    pub fn list(&self) -> Result<Vec<QuarantineRecord>> {
        self.storage.list()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("quar.tmp");
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_source(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn quarantine_then_restore_roundtrips_bytes() {
        let source_dir = tempdir().unwrap();
        let quarantine_dir = tempdir().unwrap();
        let mut manager = QuarantineManager::temporary(quarantine_dir.path()).unwrap();

        let content = vec![0x41u8; 1024];
        let source = write_source(source_dir.path(), "evil.bin", &content);

        let record = manager
            .quarantine(&source, "malware detected", ThreatLevel::Malicious, 0.9, chrono::Utc::now())
            .unwrap();
        assert!(!source.exists());
        assert!(Path::new(&record.quarantine_path).exists());

        let target = source_dir.path().join("restored.bin");
        manager.restore(record.id, &target).unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), content);
        assert!(!Path::new(&record.quarantine_path).exists());
        assert!(manager.get(record.id).unwrap().is_none());
    }

    #[test]
    fn duplicate_content_hash_is_rejected() {
        let source_dir = tempdir().unwrap();
        let quarantine_dir = tempdir().unwrap();
        let mut manager = QuarantineManager::temporary(quarantine_dir.path()).unwrap();

        let content = b"identical bytes".to_vec();
        let first = write_source(source_dir.path(), "a.bin", &content);
        let second = write_source(source_dir.path(), "b.bin", &content);

        manager
            .quarantine(&first, "r1", ThreatLevel::Suspicious, 0.5, chrono::Utc::now())
            .unwrap();
        let result = manager.quarantine(&second, "r2", ThreatLevel::Suspicious, 0.5, chrono::Utc::now());
        assert!(matches!(result, Err(QuarantineError::AlreadyQuarantined(_))));
    }

    #[test]
    fn delete_removes_record_and_blob() {
        let source_dir = tempdir().unwrap();
        let quarantine_dir = tempdir().unwrap();
        let mut manager = QuarantineManager::temporary(quarantine_dir.path()).unwrap();

        let source = write_source(source_dir.path(), "x.bin", b"content");
        let record = manager
            .quarantine(&source, "r", ThreatLevel::Critical, 0.95, chrono::Utc::now())
            .unwrap();

        manager.delete(record.id).unwrap();
        assert!(!Path::new(&record.quarantine_path).exists());
        assert!(manager.get(record.id).unwrap().is_none());
    }

    #[test]
    fn cleanup_expired_removes_only_old_records() {
        let source_dir = tempdir().unwrap();
        let quarantine_dir = tempdir().unwrap();
        let mut manager = QuarantineManager::temporary(quarantine_dir.path()).unwrap();

        let now = chrono::Utc::now();
        let old = write_source(source_dir.path(), "old.bin", b"old content");
        let recent = write_source(source_dir.path(), "recent.bin", b"recent content");

        let old_record = manager
            .quarantine(&old, "r", ThreatLevel::Malicious, 0.7, now - chrono::Duration::days(40))
            .unwrap();
        manager
            .quarantine(&recent, "r", ThreatLevel::Malicious, 0.7, now)
            .unwrap();

        let removed = manager
            .cleanup_expired(chrono::Duration::days(30), now)
            .unwrap();

        assert_eq!(removed, 1);
        assert!(manager.get(old_record.id).unwrap().is_none());
        assert_eq!(manager.list().unwrap().len(), 1);
    }

    #[test]
    fn restore_of_unknown_id_fails() {
        let quarantine_dir = tempdir().unwrap();
        let mut manager = QuarantineManager::temporary(quarantine_dir.path()).unwrap();
        assert!(manager.restore(999, Path::new("/tmp/nope")).is_err());
    }
}
