use std::io;
use std::path::PathBuf;
use thiserror::Error;
use zip::result::ZipError;

use crate::cache::codec::CodecError;

/// Errors that stop an index build
///
/// Only the classpath scan produces these: the runtime image
/// enumeration tolerates failures per module and the cache
/// falls back to regeneration.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("classpath root does not exist: {path}")]
    MissingRoot { path: PathBuf },
    #[error("IO error while scanning {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ZIP error while scanning {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
}

/// Reasons a cache record could not be read or written
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache archive {path} is unreadable: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("cache archive {path} has no entry {entry}")]
    MissingEntry { path: PathBuf, entry: &'static str },
    #[error("cache entry in {path} is invalid: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
    #[error("cache at {path} was built for a different runtime image")]
    Stale { path: PathBuf },
    #[error("no writable cache location")]
    NoLocation,
}

/// Why one module of the runtime image could not be walked
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ZIP error reading {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("malformed runtime image {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}
