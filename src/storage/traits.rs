//! Storage abstraction trait and common types.

use std::io::{Read, Seek, Write};

use serde::{Deserialize, Serialize};

use crate::error::{MailsiftError, Result};

/// Flat namespace of byte blobs that artifacts are kept in.
///
/// Names never contain path separators. [`rename_file`](Storage::rename_file)
/// must swap the target in a single step, because publishing an artifact is a
/// rename from its temporary name.
pub trait Storage: Send + Sync + std::fmt::Debug {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Truncates `name` if it already exists.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    fn file_exists(&self, name: &str) -> bool;

    /// Missing names are ignored.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// All names, in ascending order.
    fn list_files(&self) -> Result<Vec<String>>;

    fn file_size(&self, name: &str) -> Result<u64>;

    /// Move `old_name` to `new_name`, overwriting it.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Open an unused `{prefix}_{n}.tmp` name for writing.
    fn create_temp_output(&self, prefix: &str) -> Result<(String, Box<dyn StorageOutput>)>;

    /// Make completed renames durable.
    fn sync(&self) -> Result<()>;
}

/// Readable blob.
pub trait StorageInput: Read + Seek + Send + std::fmt::Debug {
    fn size(&self) -> Result<u64>;
}

/// Writable blob. Contents are durable once [`close`](StorageOutput::close) returns.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Bytes written so far.
    fn position(&self) -> Result<u64>;

    fn close(&mut self) -> Result<()>;
}

/// Upper bound on `{prefix}_{n}.tmp` probes before giving up.
const MAX_TEMP_PROBES: usize = 10_000;

/// First `{prefix}_{n}.tmp` for which `taken` is false.
pub(crate) fn free_temp_name(prefix: &str, taken: impl Fn(&str) -> bool) -> Result<String> {
    (0..MAX_TEMP_PROBES)
        .map(|n| format!("{prefix}_{n}.tmp"))
        .find(|candidate| !taken(candidate))
        .ok_or_else(|| {
            StorageError::Io(format!("no free temporary name for {prefix}")).into()
        })
}

/// Tuning shared by the storage backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Reader and writer buffer capacity in bytes.
    pub buffer_size: usize,

    /// Flush the buffer after each write call.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            buffer_size: 64 * 1024,
            sync_writes: false,
        }
    }
}

/// Backend-level failures, folded into [`MailsiftError::Storage`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("no such file: {0}")]
    NotFound(String),

    #[error("I/O failure: {0}")]
    Io(String),

    #[error("invalid name: {0}")]
    InvalidName(String),
}

impl From<StorageError> for MailsiftError {
    fn from(err: StorageError) -> Self {
        MailsiftError::storage(err.to_string())
    }
}
