//! Storage engine implementation
//!
//! Directory layout:
//! - `<root>/<namespace>/`: one directory per cache namespace
//! - `<root>/<namespace>/<key>.blob`: one blob file per key (see `parser`)

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::{Error, Result};
use crate::parser::{create_header, parse_blob};

/// File extension for committed blobs
const BLOB_EXT: &str = "blob";

/// Maximum length of a namespace or key
const MAX_NAME_LEN: usize = 128;

/// Check that a namespace or key can be used verbatim as a file name
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name != "."
        && name != ".."
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

/// BlobStore is the handle to an on-disk, namespaced key/blob store
///
/// All methods take `&self` and touch only the file system, so a single
/// store can be shared between threads. Concurrent writers to the same key
/// are last-rename-wins; readers never observe a partially written blob.
#[derive(Debug)]
pub struct BlobStore {
    /// Path to the store root directory
    root: PathBuf,

    /// Counter making temporary file names unique within this process
    tmp_seq: AtomicU64,
}

impl BlobStore {
    /// Open or create a store rooted at the given path
    ///
    /// # Arguments
    /// * `path` - Root directory; created if missing
    ///
    /// # Returns
    /// * `Result<BlobStore>` - Store handle
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref();
        fs::create_dir_all(root)?;

        Ok(BlobStore {
            root: root.to_path_buf(),
            tmp_seq: AtomicU64::new(0),
        })
    }

    /// Root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
        validate_name(namespace)?;
        Ok(self.root.join(namespace))
    }

    fn blob_path(&self, namespace: &str, key: &str) -> Result<PathBuf> {
        validate_name(key)?;
        Ok(self
            .namespace_dir(namespace)?
            .join(format!("{}.{}", key, BLOB_EXT)))
    }

    /// Check whether a blob exists for the key
    pub fn exists(&self, namespace: &str, key: &str) -> Result<bool> {
        let path = self.blob_path(namespace, key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the payload stored under the key
    ///
    /// # Returns
    /// * `Result<Vec<u8>>` - Payload bytes; `Error::NotFound` if absent,
    ///   `Error::Corrupt` if the file does not decode
    pub fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(namespace, key)?;

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::NotFound),
            Err(e) => return Err(e.into()),
        };

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let (_header, payload) = parse_blob(&data)?;
        Ok(payload.to_vec())
    }

    /// Write a payload under the key, replacing any existing blob
    ///
    /// The blob is written to a temporary file in the namespace directory,
    /// synced, and renamed into place.
    pub fn write(&self, namespace: &str, key: &str, payload: &[u8]) -> Result<()> {
        let path = self.blob_path(namespace, key)?;
        let dir = self.namespace_dir(namespace)?;
        fs::create_dir_all(&dir)?;

        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp_path = dir.join(format!(".{}.{}.{}.tmp", key, std::process::id(), seq));

        let result = (|| -> Result<()> {
            let mut tmp = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp_path)?;
            tmp.write_all(&create_header(payload.len()))?;
            tmp.write_all(payload)?;
            tmp.sync_all()?;
            fs::rename(&tmp_path, &path)?;
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result?;

        debug!(namespace, key, bytes = payload.len(), "blob written");
        Ok(())
    }

    /// Remove the blob for the key
    ///
    /// # Returns
    /// * `Result<bool>` - true if a blob was removed
    pub fn remove(&self, namespace: &str, key: &str) -> Result<bool> {
        let path = self.blob_path(namespace, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// List the keys stored in a namespace, sorted
    pub fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let dir = self.namespace_dir(namespace)?;

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(BLOB_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                if validate_name(stem).is_ok() {
                    keys.push(stem.to_string());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    /// Remove every blob in a namespace
    ///
    /// # Returns
    /// * `Result<usize>` - Number of blobs removed
    pub fn clear(&self, namespace: &str) -> Result<usize> {
        let mut removed = 0;
        for key in self.keys(namespace)? {
            if self.remove(namespace, &key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// List namespaces that have a directory under the root, sorted
    pub fn namespaces(&self) -> Result<Vec<String>> {
        let mut namespaces = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_name(name).is_ok() {
                    namespaces.push(name.to_string());
                }
            }
        }

        namespaces.sort();
        Ok(namespaces)
    }
}
