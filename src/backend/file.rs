//! Directory backend
//!
//! Each object is one file directly under the root directory, named by the
//! SHA-256 of the object name so that names of any length fit in a single
//! path component. The file starts with the object name itself:
//!
//! ```text
//! name length (u32 LE) | name (UTF-8) | object bytes
//! ```
//!
//! Writes go to a uniquely named temporary file that is renamed into place,
//! so readers never observe a partial object. Pointing several machines at
//! the same network-mounted directory gives the same sharing model as a
//! bucket.

use super::{Backend, ObjectPage, PutOptions};
use crate::{Error, Result};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Length of a hex SHA-256 file name
const FILE_NAME_LEN: usize = 64;

/// Longest object name accepted in a file header
const MAX_NAME_LEN: usize = 4096;

/// Objects stored as files in a directory
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Open a directory backend, creating the directory if needed
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| {
            Error::Configuration(format!("Failed to create {}: {}", root.display(), e))
        })?;
        Ok(FileBackend { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, name: &str) -> PathBuf {
        self.root.join(hex::encode(Sha256::digest(name.as_bytes())))
    }

    fn map_io(name: &str, e: std::io::Error) -> Error {
        match e.kind() {
            ErrorKind::NotFound => Error::ObjectNotFound(name.to_string()),
            ErrorKind::PermissionDenied => Error::PermissionDenied(format!("{}: {}", name, e)),
            _ => Error::BackendUnavailable(format!("{}: {}", name, e)),
        }
    }

    /// Read the object name stored at the start of a file
    fn read_name(reader: &mut impl Read) -> std::io::Result<String> {
        let mut len = [0u8; 4];
        reader.read_exact(&mut len)?;
        let len = u32::from_le_bytes(len) as usize;
        if len > MAX_NAME_LEN {
            return Err(std::io::Error::new(
                ErrorKind::InvalidData,
                format!("object name of {} bytes", len),
            ));
        }
        let mut name = vec![0u8; len];
        reader.read_exact(&mut name)?;
        String::from_utf8(name).map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))
    }
}

impl Backend for FileBackend {
    fn put(&self, name: &str, data: Bytes, _options: &PutOptions) -> Result<()> {
        let target = self.object_path(name);
        if name.len() > MAX_NAME_LEN {
            return Err(Error::InvalidKey(format!(
                "object name of {} bytes",
                name.len()
            )));
        }
        let name_len = name.len() as u32;

        let mut tmp = NamedTempFile::new_in(&self.root).map_err(|e| Self::map_io(name, e))?;
        let write = |file: &mut File| -> std::io::Result<()> {
            file.write_all(&name_len.to_le_bytes())?;
            file.write_all(name.as_bytes())?;
            file.write_all(&data)?;
            file.sync_all()
        };
        write(tmp.as_file_mut()).map_err(|e| Self::map_io(name, e))?;
        tmp.persist(&target)
            .map_err(|e| Self::map_io(name, e.error))?;

        debug!(name, bytes = data.len(), "file put");
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Bytes> {
        let raw = std::fs::read(self.object_path(name)).map_err(|e| Self::map_io(name, e))?;
        let mut reader = raw.as_slice();
        let stored = Self::read_name(&mut reader).map_err(|e| Self::map_io(name, e))?;
        if stored != name {
            return Err(Error::BackendUnavailable(format!(
                "{}: file holds object {}",
                name, stored
            )));
        }
        let header_len = raw.len() - reader.len();
        Ok(Bytes::from(raw).slice(header_len..))
    }

    fn delete(&self, name: &str) -> Result<()> {
        std::fs::remove_file(self.object_path(name)).map_err(|e| Self::map_io(name, e))
    }

    fn exists(&self, name: &str) -> Result<bool> {
        match std::fs::metadata(self.object_path(name)) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::map_io(name, e)),
        }
    }

    fn list_page(&self, prefix: &str, _token: Option<&str>) -> Result<ObjectPage> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| Self::map_io(prefix, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Self::map_io(prefix, e))?;
            let file_name = entry.file_name();
            // Temporary files and foreign files are skipped
            let is_object = file_name.to_str().is_some_and(|f| {
                f.len() == FILE_NAME_LEN && f.bytes().all(|b| b.is_ascii_hexdigit())
            });
            if !is_object {
                continue;
            }

            let name = match File::open(entry.path()) {
                Ok(file) => Self::read_name(&mut BufReader::new(file)),
                Err(e) => Err(e),
            };
            match name {
                Ok(name) if name.starts_with(prefix) => names.push(name),
                Ok(_) => {}
                // Deleted since the directory was read
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {}
                Err(e) if e.kind() == ErrorKind::InvalidData => {}
                Err(e) => return Err(Self::map_io(prefix, e)),
            }
        }
        names.sort();

        Ok(ObjectPage { names, next: None })
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}
