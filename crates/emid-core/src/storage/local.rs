//! Filesystem-backed blob store.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::models::config::StorageConfig;

use super::{BlobHandle, BlobStore};

/// Stages documents as uniquely named copies under a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    key_prefix: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, key_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            key_prefix: key_prefix.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.staging_dir, &config.key_prefix)
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl BlobStore for LocalBlobStore {
    fn put(&self, path: &Path) -> Result<BlobHandle, StorageError> {
        let put_error = |reason: String| StorageError::Put {
            path: path.display().to_string(),
            reason,
        };

        let dir = self.root.join(&self.key_prefix);
        fs::create_dir_all(&dir).map_err(|e| put_error(e.to_string()))?;

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let suffix = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        let mut staged = tempfile::Builder::new()
            .prefix(&format!("{}-", stem))
            .suffix(&suffix)
            .tempfile_in(&dir)
            .map_err(|e| put_error(e.to_string()))?;

        let mut source = fs::File::open(path).map_err(|e| put_error(e.to_string()))?;
        std::io::copy(&mut source, staged.as_file_mut()).map_err(|e| put_error(e.to_string()))?;

        let (_, staged_path) = staged.keep().map_err(|e| put_error(e.to_string()))?;
        let file_name = staged_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| put_error("non UTF-8 staged name".into()))?;

        let key = if self.key_prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.key_prefix, file_name)
        };

        Ok(BlobHandle {
            uri: format!("file://{}", staged_path.display()),
            key,
        })
    }

    fn read(&self, handle: &BlobHandle) -> Result<Vec<u8>, StorageError> {
        fs::read(self.object_path(&handle.key)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(handle.key.clone()),
            _ => StorageError::Read {
                key: handle.key.clone(),
                reason: e.to_string(),
            },
        })
    }

    fn delete(&self, handle: &BlobHandle) -> Result<(), StorageError> {
        fs::remove_file(self.object_path(&handle.key)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(handle.key.clone()),
            _ => StorageError::Delete {
                key: handle.key.clone(),
                reason: e.to_string(),
            },
        })
    }
}
