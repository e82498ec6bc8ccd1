use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::SecureStorage;
use crate::error::StorageError;
use crate::models::TokenPair;

/// Stores the token pair as a small JSON document.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-write leaves either the old or the new pair on disk. On unix the
/// file is readable by the owner only. Encryption at rest is left to the
/// platform keystore or an encrypted volume.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileStorage {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl SecureStorage for FileStorage {
    async fn load(&self) -> Result<Option<TokenPair>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, pair: &TokenPair) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, serde_json::to_vec(pair)?).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&temp, std::fs::Permissions::from_mode(0o600)).await?;
        }
        tokio::fs::rename(&temp, &self.path).await?;

        debug!("Session tokens written to '{}'", self.path.display());
        Ok(())
    }

    async fn remove(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));
        assert!(storage.load().await.unwrap().is_none());
        // Removing something that is not there is fine too.
        storage.remove().await.unwrap();
    }

    #[tokio::test]
    async fn test_save_creates_parent_and_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested").join("session.json"));

        storage.save(&TokenPair::new("T1", "R1")).await.unwrap();
        storage.save(&TokenPair::new("T2", "R2")).await.unwrap();

        assert_eq!(
            storage.load().await.unwrap(),
            Some(TokenPair::new("T2", "R2"))
        );
        assert!(!storage.temp_path().exists());

        storage.remove().await.unwrap();
        assert!(!storage.path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));
        storage.save(&TokenPair::new("T1", "R1")).await.unwrap();

        let mode = std::fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_garbage_is_reported_as_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"{\"access\": \"only-half\"}").unwrap();

        let err = FileStorage::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StorageError::Malformed(_)));
    }
}
