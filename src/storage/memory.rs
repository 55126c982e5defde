//! Process-local storage, used by tests and throwaway pipelines.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::storage::traits::{
    Storage, StorageConfig, StorageError, StorageInput, StorageOutput, free_temp_name,
};

type Blobs = Arc<Mutex<BTreeMap<String, Arc<[u8]>>>>;

/// [`Storage`] over a shared map of byte blobs.
///
/// An output lands under its name when closed or dropped, mirroring a file
/// that keeps whatever was written before the writer went away.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: Blobs,
}

impl MemoryStorage {
    pub fn new(_config: StorageConfig) -> Self {
        MemoryStorage::default()
    }

    pub fn new_default() -> Self {
        MemoryStorage::default()
    }

    pub fn file_count(&self) -> usize {
        self.blobs.lock().len()
    }

    fn blob(&self, name: &str) -> Result<Arc<[u8]>> {
        self.blobs
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()).into())
    }
}

impl Storage for MemoryStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let blob = self.blob(name)?;
        Ok(Box::new(MemoryInput {
            cursor: Cursor::new(blob),
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            pending: Some(Vec::new()),
            blobs: Arc::clone(&self.blobs),
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.blobs.lock().contains_key(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.blobs.lock().remove(name);
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.blobs.lock().keys().cloned().collect())
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        Ok(self.blob(name)?.len() as u64)
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        let mut blobs = self.blobs.lock();
        match blobs.remove(old_name) {
            Some(blob) => {
                blobs.insert(new_name.to_string(), blob);
                Ok(())
            }
            None => Err(StorageError::NotFound(old_name.to_string()).into()),
        }
    }

    fn create_temp_output(&self, prefix: &str) -> Result<(String, Box<dyn StorageOutput>)> {
        let name = {
            let mut blobs = self.blobs.lock();
            let name = free_temp_name(prefix, |candidate| blobs.contains_key(candidate))?;
            // claim the name while still holding the lock
            blobs.insert(name.clone(), Arc::from(Vec::<u8>::new()));
            name
        };
        let output = self.create_output(&name)?;
        Ok((name, output))
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// Reader over a snapshot of one blob.
#[derive(Debug)]
pub struct MemoryInput {
    cursor: Cursor<Arc<[u8]>>,
}

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryInput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl StorageInput for MemoryInput {
    fn size(&self) -> Result<u64> {
        Ok(self.cursor.get_ref().len() as u64)
    }
}

/// Buffers writes until closed. `pending` is `None` once closed.
#[derive(Debug)]
pub struct MemoryOutput {
    name: String,
    pending: Option<Vec<u8>>,
    blobs: Blobs,
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| io::Error::other(format!("{} is closed", self.name)))?;
        pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl StorageOutput for MemoryOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn position(&self) -> Result<u64> {
        Ok(self.pending.as_ref().map_or(0, |p| p.len() as u64))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(pending) = self.pending.take() {
            self.blobs.lock().insert(self.name.clone(), Arc::from(pending));
        }
        Ok(())
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_visible_after_close() {
        let storage = MemoryStorage::new_default();

        let mut output = storage.create_output("a.bin").unwrap();
        output.write_all(b"abc").unwrap();
        assert!(!storage.file_exists("a.bin"));
        output.close().unwrap();

        assert!(storage.file_exists("a.bin"));
        assert_eq!(storage.file_size("a.bin").unwrap(), 3);
        assert!(output.write_all(b"more").is_err());
    }

    #[test]
    fn test_dropped_output_is_kept() {
        let storage = MemoryStorage::new_default();
        {
            let mut output = storage.create_output("partial.bin").unwrap();
            output.write_all(b"half").unwrap();
        }

        let mut buffer = Vec::new();
        storage
            .open_input("partial.bin")
            .unwrap()
            .read_to_end(&mut buffer)
            .unwrap();
        assert_eq!(buffer, b"half");
    }

    #[test]
    fn test_rename_and_delete() {
        let storage = MemoryStorage::new_default();
        storage.create_output("x").unwrap().close().unwrap();

        storage.rename_file("x", "y").unwrap();
        assert_eq!(storage.list_files().unwrap(), vec!["y"]);
        assert!(storage.rename_file("x", "z").is_err());

        storage.delete_file("y").unwrap();
        assert_eq!(storage.file_count(), 0);
    }

    #[test]
    fn test_temp_names_do_not_collide() {
        let storage = MemoryStorage::new_default();

        let (first, _a) = storage.create_temp_output("model").unwrap();
        let (second, _b) = storage.create_temp_output("model").unwrap();
        assert_eq!(first, "model_0.tmp");
        assert_eq!(second, "model_1.tmp");
    }
}
