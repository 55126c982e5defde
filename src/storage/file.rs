//! Artifacts kept as plain files in one directory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::storage::traits::{
    Storage, StorageConfig, StorageError, StorageInput, StorageOutput, free_temp_name,
};

/// Directory-backed [`Storage`].
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
    config: StorageConfig,
}

impl FileStorage {
    /// Open `directory`, creating it and its parents when absent.
    pub fn new<P: AsRef<Path>>(directory: P, config: StorageConfig) -> Result<Self> {
        let root = directory.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            StorageError::Io(format!("cannot create {}: {e}", root.display()))
        })?;
        if !root.is_dir() {
            return Err(StorageError::Io(format!("{} is not a directory", root.display())).into());
        }
        Ok(FileStorage { root, config })
    }

    pub fn directory(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if plain {
            Ok(self.root.join(name))
        } else {
            Err(StorageError::InvalidName(format!("{name:?}")).into())
        }
    }

    #[cfg(unix)]
    fn fsync_root(&self) -> Result<()> {
        File::open(&self.root)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn fsync_root(&self) -> Result<()> {
        Ok(())
    }
}

fn classify_io(name: &str, e: io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
        _ => StorageError::Io(format!("{name}: {e}")),
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let file = File::open(self.resolve(name)?).map_err(|e| classify_io(name, e))?;
        let size = file.metadata().map_err(|e| classify_io(name, e))?.len();
        Ok(Box::new(FileInput {
            reader: BufReader::with_capacity(self.config.buffer_size, file),
            size,
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.resolve(name)?)
            .map_err(|e| classify_io(name, e))?;
        Ok(Box::new(FileOutput {
            writer: BufWriter::with_capacity(self.config.buffer_size, file),
            written: 0,
            flush_each_write: self.config.sync_writes,
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.resolve(name).is_ok_and(|path| path.is_file())
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.resolve(name)?) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(classify_io(name, e).into()),
            _ => Ok(()),
        }
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| StorageError::Io(e.to_string()))?;
        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StorageError::Io(e.to_string()))?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        let metadata = fs::metadata(self.resolve(name)?).map_err(|e| classify_io(name, e))?;
        Ok(metadata.len())
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        let from = self.resolve(old_name)?;
        let to = self.resolve(new_name)?;
        fs::rename(from, to).map_err(|e| classify_io(old_name, e))?;
        self.fsync_root()
    }

    fn create_temp_output(&self, prefix: &str) -> Result<(String, Box<dyn StorageOutput>)> {
        let name = free_temp_name(prefix, |candidate| self.file_exists(candidate))?;
        let output = self.create_output(&name)?;
        Ok((name, output))
    }

    fn sync(&self) -> Result<()> {
        self.fsync_root()
    }
}

/// Buffered reader over one artifact file.
#[derive(Debug)]
pub struct FileInput {
    reader: BufReader<File>,
    size: u64,
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileInput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl StorageInput for FileInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }
}

/// Buffered writer that fsyncs on close.
#[derive(Debug)]
pub struct FileOutput {
    writer: BufWriter<File>,
    written: u64,
    flush_each_write: bool,
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.written += n as u64;
        if self.flush_each_write {
            self.writer.flush()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    fn position(&self) -> Result<u64> {
        Ok(self.written)
    }

    fn close(&mut self) -> Result<()> {
        self.flush_and_sync()
    }
}
