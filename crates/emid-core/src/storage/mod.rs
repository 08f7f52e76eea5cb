//! Blob staging for documents under recognition.

#[cfg(feature = "native")]
pub mod local;

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{EmidError, Result, StorageError};

/// Reference to a staged object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHandle {
    /// Store-relative key, e.g. `emirates_ids/card-3f9a.pdf`.
    pub key: String,
    /// Location of the object as the store addresses it.
    pub uri: String,
}

/// Somewhere a document can be staged for the OCR collaborator.
pub trait BlobStore: Send + Sync {
    /// Upload a local file under a new unique key.
    fn put(&self, path: &Path) -> std::result::Result<BlobHandle, StorageError>;

    /// Fetch the bytes of a staged object.
    fn read(&self, handle: &BlobHandle) -> std::result::Result<Vec<u8>, StorageError>;

    /// Remove a staged object.
    fn delete(&self, handle: &BlobHandle) -> std::result::Result<(), StorageError>;
}

/// A document that stays staged for as long as this value is borrowed.
pub struct StagedDocument<'a> {
    store: &'a dyn BlobStore,
    handle: BlobHandle,
}

impl StagedDocument<'_> {
    pub fn handle(&self) -> &BlobHandle {
        &self.handle
    }

    pub fn read(&self) -> std::result::Result<Vec<u8>, StorageError> {
        self.store.read(&self.handle)
    }
}

/// Stage `path`, run `f` over it and delete the staged object.
///
/// The delete runs exactly once whether `f` succeeds or not. When `f` fails
/// its error is returned and a failed delete is only logged; when `f`
/// succeeds a failed delete is returned as [`EmidError::Cleanup`].
pub fn with_staged<T, F>(store: &dyn BlobStore, path: &Path, f: F) -> Result<T>
where
    F: FnOnce(&StagedDocument<'_>) -> Result<T>,
{
    let handle = store.put(path).map_err(EmidError::Upload)?;
    debug!("Staged {} as {}", path.display(), handle.uri);

    let staged = StagedDocument { store, handle };
    let outcome = f(&staged);
    let cleanup = store.delete(&staged.handle);

    match (outcome, cleanup) {
        (Ok(value), Ok(())) => {
            debug!("Released {}", staged.handle.key);
            Ok(value)
        }
        (Ok(_), Err(e)) => Err(EmidError::Cleanup(e)),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(cleanup_err)) => {
            warn!("Failed to release {}: {}", staged.handle.key, cleanup_err);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;
    use crate::error::OcrError;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct MemoryStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        deletes: Mutex<Vec<String>>,
        fail_put: bool,
        fail_delete: bool,
    }

    impl BlobStore for MemoryStore {
        fn put(&self, path: &Path) -> std::result::Result<BlobHandle, StorageError> {
            if self.fail_put {
                return Err(StorageError::Put {
                    path: path.display().to_string(),
                    reason: "bucket unavailable".into(),
                });
            }
            let key = format!("ids/{}", path.display());
            self.objects.lock().unwrap().insert(key.clone(), b"card".to_vec());
            Ok(BlobHandle {
                uri: format!("mem://{}", key),
                key,
            })
        }

        fn read(&self, handle: &BlobHandle) -> std::result::Result<Vec<u8>, StorageError> {
            self.objects
                .lock()
                .unwrap()
                .get(&handle.key)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(handle.key.clone()))
        }

        fn delete(&self, handle: &BlobHandle) -> std::result::Result<(), StorageError> {
            self.deletes.lock().unwrap().push(handle.key.clone());
            if self.fail_delete {
                return Err(StorageError::Delete {
                    key: handle.key.clone(),
                    reason: "denied".into(),
                });
            }
            self.objects.lock().unwrap().remove(&handle.key);
            Ok(())
        }
    }

    fn card() -> PathBuf {
        PathBuf::from("card.png")
    }

    #[test]
    fn test_success_deletes_once() {
        let store = MemoryStore::default();
        let bytes = with_staged(&store, &card(), |doc| {
            doc.read().map_err(|e| EmidError::Detection(e.into()))
        })
        .unwrap();

        assert_eq!(bytes, b"card".to_vec());
        assert_eq!(*store.deletes.lock().unwrap(), vec!["ids/card.png".to_string()]);
        assert!(store.objects.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failure_still_deletes_once() {
        let store = MemoryStore::default();
        let err = with_staged::<(), _>(&store, &card(), |_| {
            Err(EmidError::Detection(OcrError::Detection("no text".into())))
        })
        .unwrap_err();

        assert!(matches!(err, EmidError::Detection(_)));
        assert_eq!(store.deletes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_detection_error_wins_over_cleanup_error() {
        let store = MemoryStore {
            fail_delete: true,
            ..MemoryStore::default()
        };
        let err = with_staged::<(), _>(&store, &card(), |_| {
            Err(EmidError::Detection(OcrError::Detection("no text".into())))
        })
        .unwrap_err();

        assert!(matches!(err, EmidError::Detection(_)));
        assert_eq!(store.deletes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_cleanup_error_after_success() {
        let store = MemoryStore {
            fail_delete: true,
            ..MemoryStore::default()
        };
        let err = with_staged(&store, &card(), |_| Ok(1)).unwrap_err();

        assert!(matches!(err, EmidError::Cleanup(StorageError::Delete { .. })));
        assert!(err.to_string().starts_with("failed during staged object cleanup"));
    }

    #[test]
    fn test_upload_failure_skips_work_and_delete() {
        let store = MemoryStore {
            fail_put: true,
            ..MemoryStore::default()
        };
        let mut ran = false;
        let err = with_staged(&store, &card(), |_| {
            ran = true;
            Ok(())
        })
        .unwrap_err();

        assert!(matches!(err, EmidError::Upload(_)));
        assert!(err.to_string().starts_with("failed during upload"));
        assert!(!ran);
        assert!(store.deletes.lock().unwrap().is_empty());
    }
}
