//! The `<repo>/api` record a running daemon leaves for later invocations.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use super::files::atomic_write;
use crate::multiaddr::{Multiaddr, MultiaddrParseError};

/// Reads the advertised API address. A missing record yields `None`.
pub(super) fn read(path: &Utf8Path) -> Result<Option<Multiaddr>, ApiFileError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ApiFileError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let line = contents.lines().next().unwrap_or_default().trim();
    line.parse()
        .map(Some)
        .map_err(|source| ApiFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

pub(super) fn write(path: &Utf8Path, address: &Multiaddr) -> Result<(), ApiFileError> {
    atomic_write(path, address.to_string().as_bytes()).map_err(|source| ApiFileError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Deletes the record. Returns `true` when a file was removed.
pub(super) fn remove(path: &Utf8Path) -> Result<bool, ApiFileError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ApiFileError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Failures handling the API discovery record.
#[derive(Debug, Error)]
pub enum ApiFileError {
    #[error("failed to read API record '{path}': {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("API record '{path}' is malformed: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: MultiaddrParseError,
    },
    #[error("failed to write API record '{path}': {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove API record '{path}': {source}")]
    Remove {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}
