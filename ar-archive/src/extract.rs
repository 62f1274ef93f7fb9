// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Filesystem materialization of archive entries.

use {
    crate::{ArchiveEntry, ArchiveReader, ArchiveResult, EntryKind, Error},
    filetime::FileTime,
    std::{
        ffi::{CString, OsStr},
        io::Read,
        os::unix::ffi::OsStrExt,
        path::Path,
    },
};

impl<R: Read> ArchiveReader<R> {
    /// Materialize the current entry under `dest_root`.
    ///
    /// `entry` must be the entry most recently returned by
    /// [Self::read_next]; its payload is consumed from the reader. Regular
    /// files are streamed out, symlinks recreated from the payload target,
    /// directories and FIFOs created empty. Sockets and char/block devices
    /// are skipped silently. The entry mtime is applied without following
    /// symlinks.
    pub fn extract(&mut self, entry: &ArchiveEntry, dest_root: &Path) -> ArchiveResult<()> {
        let dest = dest_root.join(&entry.name);

        match entry.kind() {
            EntryKind::Fifo => {
                mkfifo(&dest, entry.permissions())?;
            }
            EntryKind::Directory => {
                // Updates re-extract over directories an uninstall left
                // behind non-empty.
                match std::fs::create_dir(&dest) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists
                        && dest.is_dir() => {}
                    Err(e) => return Err(e.into()),
                }
                std::fs::set_permissions(
                    &dest,
                    std::os::unix::fs::PermissionsExt::from_mode(entry.permissions()),
                )?;
            }
            EntryKind::Regular => {
                let mut file = std::fs::File::create(&dest)?;
                let copied = std::io::copy(self, &mut file)?;

                if copied != entry.size {
                    return Err(Error::SizeMismatch);
                }

                std::fs::set_permissions(
                    &dest,
                    std::os::unix::fs::PermissionsExt::from_mode(entry.permissions()),
                )?;
            }
            EntryKind::Symlink => {
                let mut target = Vec::with_capacity(entry.size as usize);
                self.read_to_end(&mut target)?;

                if target.len() as u64 != entry.size {
                    return Err(Error::SizeMismatch);
                }

                std::os::unix::fs::symlink(OsStr::from_bytes(&target), &dest)?;
            }
            EntryKind::Other => {
                return Ok(());
            }
        }

        let mtime = FileTime::from_unix_time(entry.mtime, 0);
        filetime::set_symlink_file_times(&dest, mtime, mtime)?;

        Ok(())
    }

    /// Extract every remaining entry under `dest_root`.
    ///
    /// Directory mtimes are re-applied in reverse order after the last
    /// entry, since extracting a child resets its parent's mtime.
    pub fn extract_all(&mut self, dest_root: &Path) -> ArchiveResult<()> {
        let mut directories = Vec::new();

        while let Some(entry) = self.read_next()? {
            self.extract(&entry, dest_root)?;

            if entry.kind() == EntryKind::Directory {
                directories.push(entry);
            }
        }

        for entry in directories.iter().rev() {
            let mtime = FileTime::from_unix_time(entry.mtime, 0);
            filetime::set_symlink_file_times(dest_root.join(&entry.name), mtime, mtime)?;
        }

        Ok(())
    }
}

fn mkfifo(path: &Path, mode: u32) -> ArchiveResult<()> {
    let cpath = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path contains a NUL byte",
        ))
    })?;

    let rc = unsafe { libc::mkfifo(cpath.as_ptr(), mode as libc::mode_t) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(())
}
