pub mod codec;

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;
use zip::result::ZipError;
use zip::write::FileOptions;

use crate::config::CACHE_ENTRY_NAME;
use crate::error::CacheError;
use crate::types::TypeIndex;

/// Keeps one [`TypeIndex`] in a single-entry zip archive
///
/// The store is an accelerator only: a missing, corrupt or stale record
/// means "regenerate", and a failed write is logged and forgotten.
#[derive(Debug, Clone)]
pub struct ArchiveCacheStore {
    /// Cache file locations, in lookup order
    candidates: Vec<PathBuf>,
    /// Must match the record's fingerprint for it to be used
    fingerprint: String,
}

impl ArchiveCacheStore {
    pub fn new(candidates: Vec<PathBuf>, fingerprint: impl Into<String>) -> Self {
        Self {
            candidates,
            fingerprint: fingerprint.into(),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// First candidate that already exists on disk
    pub fn resolve(&self) -> Option<&Path> {
        self.candidates
            .iter()
            .map(PathBuf::as_path)
            .find(|path| path.is_file())
    }

    /// Where a fresh record goes: the existing record if there is one,
    /// otherwise the first candidate whose directory exists
    pub fn write_target(&self) -> Option<&Path> {
        self.resolve().or_else(|| {
            self.candidates
                .iter()
                .map(PathBuf::as_path)
                .find(|path| path.parent().is_some_and(Path::is_dir))
        })
    }

    /// Returns the cached index, or regenerates (and persists) it
    ///
    /// Only an error from `regenerate` itself is propagated.
    pub fn load_or_build<F, E>(&self, regenerate: F) -> Result<TypeIndex, E>
    where
        F: FnOnce() -> Result<TypeIndex, E>,
    {
        match self.resolve() {
            Some(path) => {
                info!("Loading classes from cache file at {}", path.display());
                match self.read(path) {
                    Ok(index) => {
                        info!("Loaded {} classes from cache", index.len());
                        return Ok(index);
                    }
                    Err(e) => warn!("Cache loading failed, regenerating: {}", e),
                }
            }
            None => info!("Cache file does not exist. Generating classes."),
        }

        self.rebuild(regenerate)
    }

    /// Regenerates without consulting the existing record, then persists
    pub fn rebuild<F, E>(&self, regenerate: F) -> Result<TypeIndex, E>
    where
        F: FnOnce() -> Result<TypeIndex, E>,
    {
        let index = regenerate()?;
        self.persist(&index);
        Ok(index)
    }

    /// Writes `index` to the write target, logging instead of failing
    pub fn persist(&self, index: &TypeIndex) {
        let result = match self.write_target() {
            Some(path) => self.write(path, index),
            None => Err(CacheError::NoLocation),
        };

        if let Err(e) = result {
            warn!("Cache saving failed: {}", e);
        }
    }

    /// Reads and validates the record at `path`
    pub fn read(&self, path: &Path) -> Result<TypeIndex, CacheError> {
        let file = File::open(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|source| CacheError::Zip {
            path: path.to_path_buf(),
            source,
        })?;

        let mut entry = match archive.by_name(CACHE_ENTRY_NAME) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(CacheError::MissingEntry {
                    path: path.to_path_buf(),
                    entry: CACHE_ENTRY_NAME,
                });
            }
            Err(source) => {
                return Err(CacheError::Zip {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        // The declared entry size comes from a possibly corrupt header
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let payload = codec::decode(&bytes).map_err(|source| CacheError::Codec {
            path: path.to_path_buf(),
            source,
        })?;
        if payload.fingerprint != self.fingerprint {
            return Err(CacheError::Stale {
                path: path.to_path_buf(),
            });
        }

        Ok(payload.index)
    }

    /// Replaces the record at `path` with `index`
    ///
    /// The archive is built in a temporary file next to `path` and renamed
    /// over it, so readers never see a half-written record.
    pub fn write(&self, path: &Path, index: &TypeIndex) -> Result<(), CacheError> {
        info!("Saving {} classes to cache file {}", index.len(), path.display());

        let io_error = |source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };
        let zip_error = |source| CacheError::Zip {
            path: path.to_path_buf(),
            source,
        };

        let payload = codec::encode(&self.fingerprint, index).map_err(|source| CacheError::Codec {
            path: path.to_path_buf(),
            source,
        })?;

        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let temp = tempfile::NamedTempFile::new_in(dir).map_err(io_error)?;

        let mut writer = zip::ZipWriter::new(temp);
        writer
            .start_file(CACHE_ENTRY_NAME, FileOptions::default())
            .map_err(zip_error)?;
        writer.write_all(&payload).map_err(io_error)?;
        let temp = writer.finish().map_err(zip_error)?;

        temp.as_file().sync_all().map_err(io_error)?;
        temp.persist(path).map_err(|err| io_error(err.error))?;

        debug!("Cache saving complete");
        Ok(())
    }
}
