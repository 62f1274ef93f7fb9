// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spooling archive writer.

use {
    crate::{ArchiveEntry, ArchiveResult, Error, StringTable, ENTRY_MAGIC, MAGIC},
    std::{
        fs::File,
        io::{Read, Seek, SeekFrom, Write},
        os::unix::ffi::OsStrExt,
        path::Path,
    },
};

/// Iteratively create an archive from a staging tree.
///
/// The string table must precede the entries it names, but which names are
/// long is only known once every entry has been appended. Entries are
/// therefore written to an anonymous spool file and stitched into the
/// archive after the table when [Self::finish] is called.
///
/// Failure to call [Self::finish] leaves a magic-only archive behind.
pub struct ArchiveWriter {
    file: File,
    spool: File,
    string_table: StringTable,
    finished: bool,
}

impl ArchiveWriter {
    /// Create (or truncate) an archive file and write the magic.
    pub fn create(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let mut file = File::create(path)?;
        file.write_all(MAGIC)?;

        Ok(Self {
            file,
            spool: tempfile::tempfile()?,
            string_table: StringTable::default(),
            finished: false,
        })
    }

    /// Append the staged file `<staging_root>/<name>` as an entry named
    /// `name`.
    ///
    /// The entry's metadata is taken from `lstat`. Regular file payloads are
    /// streamed in 512-byte chunks; a symlink's payload is its `readlink`
    /// target; directories, FIFOs, and everything else carry no payload.
    pub fn append_path(&mut self, name: &str, staging_root: &Path) -> ArchiveResult<()> {
        let path = staging_root.join(name);
        let metadata = std::fs::symlink_metadata(&path)?;
        let entry = ArchiveEntry::from_metadata(name, &metadata);

        let name_field = if name.len() <= 15 && !name.contains('/') {
            format!("{}/", name)
        } else {
            format!("/{}", self.string_table.register(name))
        };

        entry.write_header(&name_field, &mut self.spool)?;

        match entry.kind() {
            crate::EntryKind::Symlink => {
                let target = std::fs::read_link(&path)?;
                let target = target.as_os_str().as_bytes();

                if target.len() as u64 != entry.size {
                    return Err(Error::SizeMismatch);
                }

                self.spool.write_all(target)?;
            }
            crate::EntryKind::Regular => {
                let copied = copy_chunked(&mut File::open(&path)?, &mut self.spool)?;

                if copied != entry.size {
                    return Err(Error::SizeMismatch);
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Finish writing the archive.
    ///
    /// Emits the string table entry if any long name was registered, then
    /// copies the spooled entries into the archive file.
    pub fn finish(&mut self) -> ArchiveResult<()> {
        if self.finished {
            return Ok(());
        }

        if !self.string_table.is_empty() {
            self.write_string_table()?;
        }

        self.spool.seek(SeekFrom::Start(0))?;
        copy_chunked(&mut self.spool, &mut self.file)?;

        self.finished = true;

        Ok(())
    }

    /// Consume self and return the archive file, finishing as needed.
    pub fn into_inner(mut self) -> ArchiveResult<File> {
        self.finish()?;

        Ok(self.file)
    }

    /// Write the `//` header and table payload.
    ///
    /// Only the name, size, and trailer cells of a string table header
    /// carry values; the remaining cells stay blank.
    fn write_string_table(&mut self) -> ArchiveResult<()> {
        let size_text = self.string_table.payload_len().to_string();
        if size_text.len() > 10 {
            return Err(Error::ValueTooLarge);
        }

        let mut header = Vec::with_capacity(60);
        header.extend_from_slice(b"//");
        header.resize(16, b' ');
        header.resize(16 + 12 + 6 + 6 + 8, b' ');
        header.extend_from_slice(size_text.as_bytes());
        header.resize(58, b' ');
        header.extend_from_slice(ENTRY_MAGIC);

        self.file.write_all(&header)?;
        self.string_table.write_payload(&mut self.file)?;

        Ok(())
    }
}

/// Copy a stream in 512-byte chunks, returning the byte count.
fn copy_chunked(reader: &mut impl Read, writer: &mut impl Write) -> ArchiveResult<u64> {
    let mut buffer = [0u8; 512];
    let mut copied = 0u64;

    loop {
        let count = reader.read(&mut buffer)?;
        if count == 0 {
            break;
        }

        writer.write_all(&buffer[..count])?;
        copied += count as u64;
    }

    Ok(copied)
}
