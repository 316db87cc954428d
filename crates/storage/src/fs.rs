// Path: crates/storage/src/fs.rs

use helm_api::storage::ObjectStore;
use helm_types::error::CasError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The filesystem blob store: `<base>/<hex>.blob`, committed by writing
/// `<hex>.blob.tmp` and renaming.
///
/// Writes take the instance mutex; reads go straight to the filesystem.
/// Two concurrent writers of identical bytes race on the rename, and both
/// observe success: rename over an existing blob replaces it with identical
/// content.
pub struct FsStore {
    base: PathBuf,
    write_lock: Mutex<()>,
}

impl FsStore {
    /// Opens (and creates) the base directory.
    pub fn open(base: impl AsRef<Path>) -> Result<Self, CasError> {
        let base = base.as_ref().to_path_buf();
        std::fs::create_dir_all(&base).map_err(|e| CasError::Backend(e.to_string()))?;
        Ok(Self {
            base,
            write_lock: Mutex::new(()),
        })
    }

    fn blob_path(&self, hex_digest: &str) -> PathBuf {
        self.base.join(format!("{hex_digest}.blob"))
    }

    fn tmp_path(&self, hex_digest: &str) -> PathBuf {
        self.base.join(format!("{hex_digest}.blob.tmp"))
    }
}

impl ObjectStore for FsStore {
    fn put(&self, hex_digest: &str, bytes: &[u8]) -> Result<(), CasError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| CasError::Backend("poisoned lock".to_string()))?;

        let blob = self.blob_path(hex_digest);
        if blob.exists() {
            return Ok(());
        }

        let tmp = self.tmp_path(hex_digest);
        {
            let mut file =
                std::fs::File::create(&tmp).map_err(|e| CasError::Backend(e.to_string()))?;
            file.write_all(bytes)
                .map_err(|e| CasError::Backend(e.to_string()))?;
            file.sync_all()
                .map_err(|e| CasError::Backend(e.to_string()))?;
        }
        std::fs::rename(&tmp, &blob).map_err(|e| CasError::Backend(e.to_string()))?;
        Ok(())
    }

    fn get(&self, hex_digest: &str) -> Result<Vec<u8>, CasError> {
        let blob = self.blob_path(hex_digest);
        match std::fs::read(&blob) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CasError::NotFound(hex_digest.to_string()))
            }
            Err(e) => Err(CasError::Backend(e.to_string())),
        }
    }

    fn exists(&self, hex_digest: &str) -> Result<bool, CasError> {
        Ok(self.blob_path(hex_digest).exists())
    }

    fn delete(&self, hex_digest: &str) -> Result<(), CasError> {
        match std::fs::remove_file(self.blob_path(hex_digest)) {
            Ok(()) => Ok(()),
            // Deleting an absent blob succeeds.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CasError::Backend(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_commits_via_rename() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        store.put("ab".repeat(32).as_str(), b"payload").unwrap();

        let blob = dir.path().join(format!("{}.blob", "ab".repeat(32)));
        assert!(blob.exists());
        // No temp file survives a successful commit.
        assert!(!dir.path().join(format!("{}.blob.tmp", "ab".repeat(32))).exists());
        assert_eq!(store.get(&"ab".repeat(32)).unwrap(), b"payload");
    }

    #[test]
    fn delete_of_absent_blob_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        store.delete(&"cd".repeat(32)).unwrap();
    }
}
