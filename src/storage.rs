//! Storage abstraction layer for published artifacts.
//!
//! Offline jobs write artifacts through an [`ArtifactStore`], which sits on a
//! pluggable [`Storage`] backend. File and memory backends can be swapped
//! without touching higher-level code, so tests run against memory while the
//! CLI uses a directory on disk.
//!
//! # Example
//!
//! ```
//! use mailsift::storage::{ArtifactStore, StorageBackend, StorageConfig, StorageFactory};
//!
//! # fn main() -> mailsift::error::Result<()> {
//! let storage = StorageFactory::create(&StorageBackend::Memory, StorageConfig::default())?;
//! let store = ArtifactStore::new(storage);
//!
//! store.publish("model.json", b"{}")?;
//! assert_eq!(store.load("model.json")?, Some(b"{}".to_vec()));
//! assert_eq!(store.load("missing.bin")?, None);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod artifact;
pub mod file;
pub mod memory;
pub mod traits;

pub use artifact::{ArtifactStore, ArtifactWriter, CLASSIFIER_ARTIFACT, SEMANTIC_INDEX_ARTIFACT};
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use traits::{Storage, StorageConfig, StorageError, StorageInput, StorageOutput};

/// Which backend to store artifacts in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageBackend {
    /// A directory on disk.
    File { directory: PathBuf },
    /// Process memory; lost on exit.
    Memory,
}

impl Default for StorageBackend {
    fn default() -> Self {
        StorageBackend::File {
            directory: PathBuf::from("artifacts"),
        }
    }
}

/// Helper for constructing concrete storage instances.
pub struct StorageFactory;

impl StorageFactory {
    pub fn create(backend: &StorageBackend, config: StorageConfig) -> Result<Arc<dyn Storage>> {
        match backend {
            StorageBackend::File { directory } => Ok(Arc::new(FileStorage::new(directory, config)?)),
            StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new(config))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_factory_creates_file_storage() {
        let temp_dir = TempDir::new().unwrap();
        let directory = temp_dir.path().join("nested");
        let storage = StorageFactory::create(
            &StorageBackend::File {
                directory: directory.clone(),
            },
            StorageConfig::default(),
        )
        .unwrap();

        assert!(directory.is_dir());
        assert!(storage.list_files().unwrap().is_empty());
    }

    #[test]
    fn test_backend_serde() {
        let backend: StorageBackend =
            serde_json::from_str(r#"{"type": "file", "directory": "/tmp/x"}"#).unwrap();
        assert_eq!(
            backend,
            StorageBackend::File {
                directory: PathBuf::from("/tmp/x")
            }
        );
        let memory: StorageBackend = serde_json::from_str(r#"{"type": "memory"}"#).unwrap();
        assert_eq!(memory, StorageBackend::Memory);
    }
}
