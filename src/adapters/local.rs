use crate::domain::ports::Adapter;
use crate::utils::error::{Result, StorageError};
use crate::utils::validation::{validate_key, validate_prefix};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

const TEMP_PREFIX: &str = ".keystash-";

/// Files under a root directory on the local filesystem.
///
/// Nothing is touched until the first operation; the root is created on first write.
#[derive(Debug, Clone)]
pub struct LocalAdapter {
    root: PathBuf,
}

impl LocalAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(op)
            .await
            .map_err(|e| StorageError::backend(self.describe(), e))?
    }
}

#[async_trait]
impl Adapter for LocalAdapter {
    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let data = data.to_vec();
        tracing::debug!("Writing {} bytes to {}", data.len(), path.display());

        self.blocking(move || {
            let parent = path.parent().ok_or_else(|| StorageError::InvalidKeyError {
                key: path.display().to_string(),
                reason: "key has no parent directory".to_string(),
            })?;
            std::fs::create_dir_all(parent)?;

            // Temp files are created 0600 and renamed over the target.
            let mut temp = tempfile::Builder::new()
                .prefix(TEMP_PREFIX)
                .tempfile_in(parent)?;
            temp.write_all(&data)?;
            temp.as_file().sync_all()?;
            persist(temp, &path)
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        validate_prefix(prefix)?;
        let root = self.root.clone();
        let prefix = prefix.to_string();

        self.blocking(move || {
            if !root.exists() {
                return Ok(Vec::new());
            }

            let mut keys = Vec::new();
            for entry in WalkDir::new(&root).follow_links(false) {
                let entry = entry.map_err(|e| StorageError::IoError(e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                    continue;
                }

                let Ok(relative) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(&prefix) {
                    keys.push(key);
                }
            }

            keys.sort();
            Ok(keys)
        })
        .await
    }
}

fn persist(temp: NamedTempFile, path: &Path) -> Result<()> {
    temp.persist(path).map_err(|e| StorageError::IoError(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_construction_does_not_touch_disk() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("not-yet-created");

        let adapter = LocalAdapter::new(&root);

        assert!(!root.exists());
        assert!(!adapter.exists("account/key.private.pem").await.unwrap());
        assert!(adapter.list("").await.unwrap().is_empty());
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let dir = TempDir::new().unwrap();
        let adapter = LocalAdapter::new(dir.path());

        adapter.write("certs/example.com/public/cert.pem", b"CERT").await.unwrap();
        assert!(adapter.exists("certs/example.com/public/cert.pem").await.unwrap());
        assert_eq!(
            adapter.read("certs/example.com/public/cert.pem").await.unwrap(),
            b"CERT"
        );

        adapter.write("certs/example.com/public/cert.pem", b"CERT2").await.unwrap();
        assert_eq!(
            adapter.read("certs/example.com/public/cert.pem").await.unwrap(),
            b"CERT2"
        );

        adapter.delete("certs/example.com/public/cert.pem").await.unwrap();
        assert!(!adapter.exists("certs/example.com/public/cert.pem").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let dir = TempDir::new().unwrap();
        let adapter = LocalAdapter::new(dir.path());

        let err = adapter.read("account/key.private.pem").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { ref key } if key == "account/key.private.pem"));
        assert!(adapter.delete("account/key.private.pem").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_prefix_filtered() {
        let dir = TempDir::new().unwrap();
        let adapter = LocalAdapter::new(dir.path());

        adapter.write("certs/b.example/public/cert.pem", b"B").await.unwrap();
        adapter.write("certs/a.example/public/cert.pem", b"A").await.unwrap();
        adapter.write("account/key.private.pem", b"K").await.unwrap();

        assert_eq!(
            adapter.list("certs/").await.unwrap(),
            vec![
                "certs/a.example/public/cert.pem".to_string(),
                "certs/b.example/public/cert.pem".to_string(),
            ]
        );
        assert_eq!(adapter.list("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let adapter = LocalAdapter::new(dir.path());

        let err = adapter.write("../outside.pem", b"X").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKeyError { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_written_files_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let adapter = LocalAdapter::new(dir.path());
        adapter.write("account/key.private.pem", b"K").await.unwrap();

        let mode = std::fs::metadata(dir.path().join("account/key.private.pem"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
