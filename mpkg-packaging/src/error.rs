// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use {std::path::Path, thiserror::Error};

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum MpkgError {
    #[error("{0}: {1}")]
    Archive(String, #[source] ar_archive::Error),

    #[error("{0}: {1}: {2}")]
    PathIo(&'static str, String, #[source] std::io::Error),

    #[error("{path}:{line}: {message}")]
    ManifestParse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("{path}:{line}: {message}")]
    CatalogParse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("{0}: duplicate catalog entry")]
    DuplicateCatalogEntry(String),

    #[error("{0}: not found in catalog")]
    PackageNotFound(String),

    #[error("{0}: not installed")]
    NotInstalled(String),

    #[error("dependency cycle detected: {0}")]
    DependencyCycle(String),

    #[error("{0}: dependency still unsatisfied after sub-install")]
    DependencyUnsatisfied(String),

    #[error("transaction already in progress (lock held at {0})")]
    TransactionLocked(String),
}

impl MpkgError {
    /// Wrap an I/O error with the failing operation and path.
    pub(crate) fn path_io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::PathIo(op, path.display().to_string(), source)
    }

    /// Wrap a codec error with the archive path it concerns.
    pub(crate) fn archive(path: &Path, source: ar_archive::Error) -> Self {
        Self::Archive(path.display().to_string(), source)
    }
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, MpkgError>;
