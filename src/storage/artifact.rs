//! Atomic publication of named build artifacts.
//!
//! An artifact is written under a temporary name, synced, and renamed into
//! place only when complete, so readers see either the previous artifact, the
//! new one, or nothing. The payload is framed as:
//!
//! ```text
//! magic "MSFT" | version u32 | payload ... | payload length u64 | crc32 u32
//! ```
//!
//! All integers are little-endian. [`ArtifactStore::load`] verifies the frame
//! and never hands out a truncated payload.

use std::io::{Read, Write};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info, warn};

use crate::error::{MailsiftError, Result};
use crate::storage::traits::{Storage, StorageOutput};

/// Vocabulary and trained model.
pub const CLASSIFIER_ARTIFACT: &str = "classifier.json";

/// Labeled embedding records.
pub const SEMANTIC_INDEX_ARTIFACT: &str = "semantic_index.bin";

const MAGIC: &[u8; 4] = b"MSFT";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8;
const TRAILER_LEN: usize = 12;
const TEMP_SUFFIX: &str = ".tmp";

/// Reads and publishes named artifacts on a [`Storage`] backend.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    storage: Arc<dyn Storage>,
}

impl ArtifactStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        ArtifactStore { storage }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Whether a published artifact named `name` exists.
    pub fn exists(&self, name: &str) -> bool {
        self.storage.file_exists(name)
    }

    /// Start writing `name` under a temporary name.
    ///
    /// Nothing is visible under `name` until [`ArtifactWriter::commit`].
    pub fn begin(&self, name: &str) -> Result<ArtifactWriter> {
        if name.ends_with(TEMP_SUFFIX) {
            return Err(MailsiftError::invalid_argument(format!(
                "artifact names may not end in {TEMP_SUFFIX}: {name}"
            )));
        }

        let (temp_name, mut output) = self.storage.create_temp_output(name)?;
        output.write_all(MAGIC)?;
        output.write_u32::<LittleEndian>(FORMAT_VERSION)?;
        debug!("Writing artifact {name} via {temp_name}");

        Ok(ArtifactWriter {
            storage: Arc::clone(&self.storage),
            name: name.to_string(),
            temp_name,
            output,
            hasher: crc32fast::Hasher::new(),
            length: 0,
        })
    }

    /// Write `payload` as artifact `name` in one step.
    pub fn publish(&self, name: &str, payload: &[u8]) -> Result<()> {
        let mut writer = self.begin(name)?;
        writer.write_all(payload)?;
        writer.commit()
    }

    /// Read artifact `name`.
    ///
    /// Returns `Ok(None)` when it has not been published and
    /// [`MailsiftError::ArtifactCorrupted`] when its frame does not verify.
    pub fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        if !self.storage.file_exists(name) {
            return Ok(None);
        }

        let mut input = self.storage.open_input(name)?;
        let mut bytes = Vec::with_capacity(input.size()? as usize);
        input.read_to_end(&mut bytes)?;

        decode_frame(name, bytes).map(Some)
    }

    /// Read artifact `name`, treating absence as [`MailsiftError::ArtifactMissing`].
    pub fn require(&self, name: &str) -> Result<Vec<u8>> {
        self.load(name)?
            .ok_or_else(|| MailsiftError::artifact_missing(name))
    }

    /// Delete leftovers of interrupted writes of artifact `name`.
    ///
    /// Only `{name}_{n}.tmp` files are touched; temporaries of other
    /// artifacts are left alone. Returns how many were removed.
    pub fn sweep_temporaries(&self, name: &str) -> Result<usize> {
        let mut removed = 0;
        for file in self.storage.list_files()? {
            if is_temporary_of(name, &file) {
                self.storage.delete_file(&file)?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Removed {removed} stale temporary file(s) of {name}");
        }
        Ok(removed)
    }
}

fn is_temporary_of(name: &str, file: &str) -> bool {
    file.strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|rest| rest.strip_suffix(TEMP_SUFFIX))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn decode_frame(name: &str, mut bytes: Vec<u8>) -> Result<Vec<u8>> {
    if bytes.len() < HEADER_LEN + TRAILER_LEN {
        return Err(MailsiftError::artifact_corrupted(format!(
            "{name}: {} bytes is shorter than the frame",
            bytes.len()
        )));
    }
    if &bytes[..4] != MAGIC {
        return Err(MailsiftError::artifact_corrupted(format!("{name}: bad magic")));
    }

    let mut header = &bytes[4..HEADER_LEN];
    let version = header.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(MailsiftError::artifact_corrupted(format!(
            "{name}: unsupported format version {version}"
        )));
    }

    let payload_end = bytes.len() - TRAILER_LEN;
    let mut trailer = &bytes[payload_end..];
    let length = trailer.read_u64::<LittleEndian>()?;
    let checksum = trailer.read_u32::<LittleEndian>()?;

    let actual_length = (payload_end - HEADER_LEN) as u64;
    if length != actual_length {
        return Err(MailsiftError::artifact_corrupted(format!(
            "{name}: expected {length} payload bytes, found {actual_length}"
        )));
    }

    let payload = &bytes[HEADER_LEN..payload_end];
    if crc32fast::hash(payload) != checksum {
        return Err(MailsiftError::artifact_corrupted(format!(
            "{name}: checksum mismatch"
        )));
    }

    bytes.truncate(payload_end);
    bytes.drain(..HEADER_LEN);
    Ok(bytes)
}

/// An artifact being written. Dropping it without [`commit`](Self::commit)
/// leaves only the temporary file behind.
pub struct ArtifactWriter {
    storage: Arc<dyn Storage>,
    name: String,
    temp_name: String,
    output: Box<dyn StorageOutput>,
    hasher: crc32fast::Hasher,
    length: u64,
}

impl std::fmt::Debug for ArtifactWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactWriter")
            .field("name", &self.name)
            .field("temp_name", &self.temp_name)
            .field("length", &self.length)
            .finish()
    }
}

impl ArtifactWriter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn temp_name(&self) -> &str {
        &self.temp_name
    }

    /// Seal the frame, sync, and move the artifact into place.
    pub fn commit(mut self) -> Result<()> {
        let checksum = self.hasher.clone().finalize();
        self.output.write_u64::<LittleEndian>(self.length)?;
        self.output.write_u32::<LittleEndian>(checksum)?;
        self.output.flush_and_sync()?;
        self.output.close()?;

        self.storage.rename_file(&self.temp_name, &self.name)?;
        self.storage.sync()?;
        info!("Published artifact {} ({} bytes)", self.name, self.length);
        Ok(())
    }

    /// Give up on this artifact and remove the temporary file.
    pub fn abort(mut self) -> Result<()> {
        self.output.close()?;
        self.storage.delete_file(&self.temp_name)?;
        warn!("Abandoned artifact {}", self.name);
        Ok(())
    }
}

impl Write for ArtifactWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.output.write(buf)?;
        self.hasher.update(&buf[..written]);
        self.length += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.output.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::file::FileStorage;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::traits::StorageConfig;
    use tempfile::TempDir;

    fn memory_store() -> ArtifactStore {
        ArtifactStore::new(Arc::new(MemoryStorage::new_default()))
    }

    #[test]
    fn test_publish_and_load() {
        let store = memory_store();
        store.publish(CLASSIFIER_ARTIFACT, b"model bytes").unwrap();

        assert!(store.exists(CLASSIFIER_ARTIFACT));
        assert_eq!(
            store.load(CLASSIFIER_ARTIFACT).unwrap(),
            Some(b"model bytes".to_vec())
        );
        assert_eq!(store.storage().list_files().unwrap(), vec![CLASSIFIER_ARTIFACT]);
    }

    #[test]
    fn test_missing_artifact() {
        let store = memory_store();
        assert_eq!(store.load(SEMANTIC_INDEX_ARTIFACT).unwrap(), None);
        assert!(store.require(SEMANTIC_INDEX_ARTIFACT).unwrap_err().is_missing_artifact());
    }

    #[test]
    fn test_uncommitted_writer_publishes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(FileStorage::new(temp_dir.path(), StorageConfig::default()).unwrap());
        let store = ArtifactStore::new(storage.clone());

        let mut writer = store.begin(CLASSIFIER_ARTIFACT).unwrap();
        writer.write_all(b"half of a model").unwrap();
        let temp_name = writer.temp_name().to_string();
        drop(writer);

        assert!(!store.exists(CLASSIFIER_ARTIFACT));
        assert_eq!(store.load(CLASSIFIER_ARTIFACT).unwrap(), None);
        assert!(temp_name.ends_with(".tmp"));

        assert_eq!(store.sweep_temporaries(CLASSIFIER_ARTIFACT).unwrap(), 1);
        assert!(storage.list_files().unwrap().is_empty());
    }

    #[test]
    fn test_sweep_leaves_other_artifacts_alone() {
        let store = memory_store();
        store.publish(CLASSIFIER_ARTIFACT, b"model").unwrap();

        let mut stale = store.begin(CLASSIFIER_ARTIFACT).unwrap();
        stale.write_all(b"old run").unwrap();
        drop(stale);
        let in_flight = store.begin(SEMANTIC_INDEX_ARTIFACT).unwrap();
        let in_flight_name = in_flight.temp_name().to_string();

        assert_eq!(store.sweep_temporaries(CLASSIFIER_ARTIFACT).unwrap(), 1);
        let files = store.storage().list_files().unwrap();
        assert!(files.contains(&CLASSIFIER_ARTIFACT.to_string()));
        assert!(files.contains(&in_flight_name));
        assert_eq!(files.len(), 2);

        in_flight.commit().unwrap();
        assert_eq!(store.sweep_temporaries(SEMANTIC_INDEX_ARTIFACT).unwrap(), 0);
    }

    #[test]
    fn test_republish_replaces() {
        let store = memory_store();
        store.publish(SEMANTIC_INDEX_ARTIFACT, b"v1").unwrap();
        store.publish(SEMANTIC_INDEX_ARTIFACT, b"v2").unwrap();
        assert_eq!(store.require(SEMANTIC_INDEX_ARTIFACT).unwrap(), b"v2");
    }

    #[test]
    fn test_abort_removes_temporary() {
        let store = memory_store();
        let mut writer = store.begin("scratch.bin").unwrap();
        writer.write_all(b"abc").unwrap();
        writer.abort().unwrap();
        assert!(store.storage().list_files().unwrap().is_empty());
    }

    #[test]
    fn test_corruption_detected() {
        let store = memory_store();
        store.publish("a.bin", b"payload").unwrap();

        let mut raw = Vec::new();
        store
            .storage()
            .open_input("a.bin")
            .unwrap()
            .read_to_end(&mut raw)
            .unwrap();
        raw[HEADER_LEN] ^= 0xff;
        let mut output = store.storage().create_output("a.bin").unwrap();
        output.write_all(&raw).unwrap();
        output.close().unwrap();

        assert!(matches!(
            store.load("a.bin"),
            Err(MailsiftError::ArtifactCorrupted(_))
        ));

        let mut output = store.storage().create_output("short.bin").unwrap();
        output.write_all(b"MSFT").unwrap();
        output.close().unwrap();
        assert!(store.load("short.bin").is_err());
    }

    #[test]
    fn test_temp_suffix_rejected() {
        assert!(memory_store().begin("model.tmp").is_err());
    }
}
