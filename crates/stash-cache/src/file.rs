//! File-based store implementation.
//!
//! [`FileRegistry`] hands out [`FileStore`]s rooted in subdirectories of a
//! cache root. Each entry is a single file with a binary header followed by
//! the payload:
//!
//! ```text
//! [header_len: u32 LE][header JSON][payload bytes]
//! ```
//!
//! The header carries the name, characteristics, metadata, expiry, verifier
//! and write time. Bulk removal and garbage collection only read headers; the
//! payload is read on a lookup hit.
//!
//! Writes go to a temporary file in the target directory and are renamed into
//! place, so readers observe either the old or the new entry. Sweeps move a
//! matched record aside to a hidden tombstone and re-check it there before
//! deleting, so a record rewritten between the check and the delete survives.
//!
//! On construction, [`FileRegistry`] validates a `VERSION` file in the cache
//! root. If the version mismatches or is missing, the entire cache directory is
//! wiped and recreated. This ensures stale record formats are never read.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::characteristics::{name_digest, storage_key};
use crate::clock::{Clock, SystemClock, age_cutoff};
use crate::store::{KeyedCacheStore, StoreRegistry};
use crate::{CacheEntry, CacheError, CachedItem, Characteristics};

/// File-based [`StoreRegistry`] rooted at a directory on disk.
///
/// Directory layout:
/// ```text
/// {root}/
/// +-- VERSION                  # contains the cache version string
/// +-- shared/                  # stores resolved with shared = true
/// |   +-- responses/           # store "responses"
/// |       +-- {name digest}/   # one directory per entry name
/// |           +-- {key digest} # one file per entry
/// +-- local/                   # stores resolved with shared = false
///     +-- ...
/// ```
pub struct FileRegistry {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileRegistry {
    /// Open a file-based registry at `root`, validating the cache version.
    ///
    /// If the `VERSION` file inside `root` does not match `version`, the entire
    /// cache directory is removed and recreated with the new version.
    pub fn new(root: PathBuf, version: &str) -> Result<Self, CacheError> {
        Self::with_clock(root, version, Arc::new(SystemClock))
    }

    /// Like [`FileRegistry::new`], stamping writes with `clock`.
    pub fn with_clock(
        root: PathBuf,
        version: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CacheError> {
        validate_version(&root, version)?;
        Ok(Self { root, clock })
    }

    /// Cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl StoreRegistry for FileRegistry {
    fn resolve(&self, name: &str, shared: bool) -> Result<Arc<dyn KeyedCacheStore>, CacheError> {
        validate_store_name(name)?;
        let partition = if shared { "shared" } else { "local" };
        let dir = self.root.join(partition).join(name);
        tracing::debug!(name, shared, dir = %dir.display(), "resolved file store");
        Ok(Arc::new(FileStore {
            dir,
            clock: Arc::clone(&self.clock),
        }))
    }
}

/// Store names become directory names, so keep them to a portable subset.
fn validate_store_name(name: &str) -> Result<(), CacheError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(CacheError::backend(
            "file",
            format!("invalid store name {name:?}"),
        ))
    }
}

/// A single store backed by a directory on disk.
pub struct FileStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

/// Record header preceding the payload.
#[derive(Serialize, Deserialize)]
struct RecordHeader {
    name: String,
    characteristics: Characteristics,
    metadata: Vec<(String, String)>,
    expires_at: Option<DateTime<Utc>>,
    verifier: Option<String>,
    written_at: DateTime<Utc>,
}

impl RecordHeader {
    fn into_item(self, payload: Vec<u8>) -> CachedItem {
        let mut item = CachedItem::new(payload).with_metadata(self.metadata);
        if let Some(expires_at) = self.expires_at {
            item = item.with_expires_at(expires_at);
        }
        if let Some(verifier) = self.verifier {
            item = item.with_verifier(verifier);
        }
        item
    }
}

/// Outcome of reading a record header.
enum Record {
    Missing,
    Corrupt,
    /// Header plus the file positioned at the start of the payload.
    Found(RecordHeader, File),
}

fn io_error(path: &Path, err: io::Error) -> CacheError {
    CacheError::backend(format!("file {}", path.display()), err)
}

impl FileStore {
    /// Open a store directly at `dir`, bypassing any registry.
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            clock: Arc::new(SystemClock),
        }
    }

    fn name_dir(&self, name: &str) -> PathBuf {
        self.dir.join(name_digest(name))
    }

    fn entry_path(&self, name: &str, characteristics: &Characteristics) -> Result<PathBuf, CacheError> {
        Ok(self.name_dir(name).join(storage_key(name, characteristics)?))
    }

    /// Read only the header of the record at `path`.
    fn read_header(path: &Path) -> Result<Record, CacheError> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Record::Missing),
            Err(err) => return Err(io_error(path, err)),
        };

        // Read header length (u32 LE)
        let mut len_buf = [0u8; 4];
        match file.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(Record::Corrupt),
            Err(err) => return Err(io_error(path, err)),
        }
        let header_len = u64::from(u32::from_le_bytes(len_buf));

        // A length past the end of the file is corruption, not an allocation size
        let file_len = file.metadata().map_err(|e| io_error(path, e))?.len();
        if header_len > file_len.saturating_sub(4) {
            return Ok(Record::Corrupt);
        }
        let Ok(header_len) = usize::try_from(header_len) else {
            return Ok(Record::Corrupt);
        };

        let mut header_buf = vec![0u8; header_len];
        match file.read_exact(&mut header_buf) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(Record::Corrupt),
            Err(err) => return Err(io_error(path, err)),
        }

        match serde_json::from_slice(&header_buf) {
            Ok(header) => Ok(Record::Found(header, file)),
            Err(_) => Ok(Record::Corrupt),
        }
    }

    /// Delete a record file, treating an already missing file as success.
    fn remove_file(path: &Path) -> Result<(), CacheError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(path, err)),
        }
    }

    fn purge_corrupt(path: &Path) -> Result<(), CacheError> {
        tracing::warn!(path = %path.display(), "purging corrupt cache record");
        Self::remove_file(path)
    }

    /// Entry directories to scan: the one for `name`, or all of them.
    fn name_dirs(&self, name: Option<&str>) -> Result<Vec<PathBuf>, CacheError> {
        if let Some(name) = name {
            return Ok(vec![self.name_dir(name)]);
        }
        list_dir(&self.dir)
    }

    /// Remove every record whose header satisfies `matches`.
    fn remove_where(
        &self,
        name: Option<&str>,
        matches: impl Fn(&RecordHeader) -> bool,
    ) -> Result<usize, CacheError> {
        let mut removed = 0;
        for dir in self.name_dirs(name)? {
            for path in list_dir(&dir)? {
                match Self::read_header(&path)? {
                    Record::Missing => {}
                    Record::Corrupt => Self::purge_corrupt(&path)?,
                    Record::Found(header, file) => {
                        drop(file);
                        if matches(&header) && Self::remove_if(&dir, &path, &matches)? {
                            removed += 1;
                        }
                    }
                }
            }
        }
        Ok(removed)
    }

    /// Delete the record at `path` if it still satisfies `matches`.
    ///
    /// The record is first renamed onto a hidden tombstone in `dir`, which
    /// detaches it from concurrent writers, and its header is read again
    /// there. A record that no longer matches was written after the sweep
    /// looked at it; it is linked back unless an even newer write has already
    /// taken its place.
    fn remove_if(
        dir: &Path,
        path: &Path,
        matches: impl Fn(&RecordHeader) -> bool,
    ) -> Result<bool, CacheError> {
        let tombstone = NamedTempFile::new_in(dir)
            .map_err(|e| io_error(dir, e))?
            .into_temp_path();
        match fs::rename(path, &tombstone) {
            Ok(()) => {}
            // Someone else removed it first
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(io_error(path, err)),
        }

        let still_matches = match Self::read_header(&tombstone)? {
            Record::Found(header, _) => matches(&header),
            Record::Missing | Record::Corrupt => true,
        };
        if !still_matches {
            tracing::debug!(path = %path.display(), "record rewritten during sweep, keeping it");
            match fs::hard_link(&tombstone, path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(err) => return Err(io_error(path, err)),
            }
        }
        tombstone.close().map_err(|e| io_error(dir, e))?;
        Ok(still_matches)
    }
}

/// List the non-hidden entries of `dir`. A missing directory is empty.
///
/// Hidden names are in-flight temporary files.
fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, CacheError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_error(dir, err)),
    };
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_error(dir, e))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        paths.push(entry.path());
    }
    Ok(paths)
}

impl KeyedCacheStore for FileStore {
    fn get(
        &self,
        name: &str,
        characteristics: &Characteristics,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Option<CachedItem>, CacheError> {
        let path = self.entry_path(name, characteristics)?;
        let (header, mut file) = match Self::read_header(&path)? {
            Record::Missing => return Ok(None),
            Record::Corrupt => {
                Self::purge_corrupt(&path)?;
                return Ok(None);
            }
            Record::Found(header, file) => (header, file),
        };

        // Guard against digest collisions
        if header.name != name || header.characteristics != *characteristics {
            return Ok(None);
        }
        if let Some(as_of) = as_of
            && header.expires_at.is_some_and(|expires_at| expires_at < as_of)
        {
            return Ok(None);
        }

        // Header matches, read the payload
        let mut payload = Vec::new();
        file.read_to_end(&mut payload)
            .map_err(|e| io_error(&path, e))?;
        Ok(Some(header.into_item(payload)))
    }

    fn store(
        &self,
        name: &str,
        characteristics: &Characteristics,
        item: CachedItem,
    ) -> Result<(), CacheError> {
        let path = self.entry_path(name, characteristics)?;
        let header = RecordHeader {
            name: name.to_owned(),
            characteristics: characteristics.clone(),
            metadata: item.metadata().to_vec(),
            expires_at: item.expires_at(),
            verifier: item.verifier().map(str::to_owned),
            written_at: self.clock.now(),
        };
        let header_bytes = serde_json::to_vec(&header)
            .map_err(|e| CacheError::InvalidCharacteristics(e.to_string()))?;
        let header_len = u32::try_from(header_bytes.len()).map_err(|_| {
            CacheError::InvalidCharacteristics("record header exceeds 4 GiB".to_owned())
        })?;

        let payload = item.payload();
        let mut buf = Vec::with_capacity(4 + header_bytes.len() + payload.len());
        buf.extend_from_slice(&header_len.to_le_bytes());
        buf.extend_from_slice(&header_bytes);
        buf.extend_from_slice(payload);

        let Some(dir) = path.parent() else {
            return Err(CacheError::backend("file", "entry path has no parent"));
        };
        fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| io_error(dir, e))?;
        tmp.write_all(&buf).map_err(|e| io_error(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| io_error(&path, e.error))?;
        Ok(())
    }

    fn remove(&self, name: &str, characteristics: &Characteristics) -> Result<(), CacheError> {
        Self::remove_file(&self.entry_path(name, characteristics)?)
    }

    fn remove_all(
        &self,
        name: Option<&str>,
        partial: &Characteristics,
    ) -> Result<usize, CacheError> {
        partial.validate()?;
        self.remove_where(name, |header| {
            name.is_none_or(|name| header.name == name)
                && header.characteristics.contains_all(partial)
        })
    }

    fn clear(&self) -> Result<(), CacheError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&self.dir, err)),
        }
    }

    fn garbage_collect(&self, max_age: Duration) -> Result<usize, CacheError> {
        let Some(cutoff) = age_cutoff(self.clock.now(), max_age) else {
            return Ok(0);
        };
        let removed = self.remove_where(None, |header| header.written_at < cutoff)?;
        if removed > 0 {
            tracing::info!(
                removed,
                ?max_age,
                dir = %self.dir.display(),
                "garbage collected file store"
            );
        }
        Ok(removed)
    }

    fn len(&self) -> Result<usize, CacheError> {
        let mut count = 0;
        for dir in list_dir(&self.dir)? {
            count += list_dir(&dir)?.len();
        }
        Ok(count)
    }

    fn entries(
        &self,
        name: Option<&str>,
        partial: &Characteristics,
    ) -> Result<Vec<CacheEntry>, CacheError> {
        partial.validate()?;
        let mut found = Vec::new();
        for dir in self.name_dirs(name)? {
            for path in list_dir(&dir)? {
                let (header, mut file) = match Self::read_header(&path)? {
                    Record::Missing => continue,
                    Record::Corrupt => {
                        Self::purge_corrupt(&path)?;
                        continue;
                    }
                    Record::Found(header, file) => (header, file),
                };
                if name.is_some_and(|name| header.name != name)
                    || !header.characteristics.contains_all(partial)
                {
                    continue;
                }
                let mut payload = Vec::new();
                file.read_to_end(&mut payload)
                    .map_err(|e| io_error(&path, e))?;
                found.push(CacheEntry {
                    name: header.name.clone(),
                    characteristics: header.characteristics.clone(),
                    item: header.into_item(payload),
                });
            }
        }
        Ok(found)
    }
}

/// Validate the cache version, wiping the directory on mismatch.
fn validate_version(root: &Path, version: &str) -> Result<(), CacheError> {
    let version_file = root.join("VERSION");

    // Anything but a missing file means the root cannot be trusted or wiped
    match fs::read_to_string(&version_file) {
        Ok(stored) if stored == version => {
            tracing::debug!("cache version matches: {version}");
            return Ok(());
        }
        Ok(stored) => {
            tracing::info!(
                "cache version mismatch (stored={stored}, current={version}), wiping cache"
            );
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::info!("no cache VERSION file found, initializing cache");
        }
        Err(err) => return Err(io_error(&version_file, err)),
    }

    reset_root(root)?;
    fs::write(&version_file, version).map_err(|e| io_error(&version_file, e))?;
    Ok(())
}

/// Remove everything under `root` and recreate it empty.
///
/// A root that cannot be removed fails the registry: stamping a new version
/// over stale records would let them be read as current.
fn reset_root(root: &Path) -> Result<(), CacheError> {
    match fs::remove_dir_all(root) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(io_error(root, err)),
    }
    fs::create_dir_all(root).map_err(|e| io_error(root, e))
}
