// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-root transaction locking.

use {
    crate::{MpkgError, Result},
    std::path::{Path, PathBuf},
};

/// Exclusive lock over one root's installed database.
///
/// Created as `<root>/var/db/mpkg/.lock` with `O_EXCL` semantics and held
/// for the duration of a transaction; the file is removed when the guard is
/// dropped. Concurrent transactions against the same root fail with
/// [MpkgError::TransactionLocked] instead of corrupting each other.
#[derive(Debug)]
pub struct TransactionLock {
    path: PathBuf,
}

impl TransactionLock {
    /// Acquire the lock for a database directory.
    pub fn acquire(db_path: &Path) -> Result<Self> {
        let path = db_path.join(".lock");

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(MpkgError::TransactionLocked(path.display().to_string()))
            }
            Err(e) => Err(MpkgError::path_io("open", &path, e)),
        }
    }
}

impl Drop for TransactionLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("unlink: {}: {}", self.path.display(), e);
        }
    }
}
