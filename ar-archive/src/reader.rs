// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Streaming archive reader.

use {
    crate::{
        header::{RawHeader, HEADER_LEN},
        ArchiveEntry, ArchiveResult, Error, StringTable, MAGIC,
    },
    std::{
        fs::File,
        io::{BufReader, Read, Take},
        path::Path,
    },
};

/// A cursor over the entries of an archive.
///
/// Advance the cursor with [Self::read_next]. After an entry is returned,
/// the [Read] impl yields that entry's payload and hits EOF at its end;
/// unconsumed payload bytes are skipped on the next advance. The string
/// table entry (`//`) is consumed internally and never returned.
///
/// Instances also implement [Iterator] over the entries of the archive.
pub struct ArchiveReader<R: Read> {
    archive_reader: Option<R>,
    entry_reader: Option<Take<R>>,
    string_table: StringTable,
}

impl ArchiveReader<BufReader<File>> {
    /// Open an archive file for reading.
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read> ArchiveReader<R> {
    /// Construct an instance from a reader, validating the archive magic.
    pub fn new(mut reader: R) -> ArchiveResult<Self> {
        let mut magic = [0u8; MAGIC.len()];

        reader.read_exact(&mut magic).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::BadMagic
            } else {
                e.into()
            }
        })?;

        if &magic != MAGIC {
            return Err(Error::BadMagic);
        }

        Ok(Self {
            archive_reader: Some(reader),
            entry_reader: None,
            string_table: StringTable::default(),
        })
    }

    /// Read the next entry header from the archive.
    ///
    /// `Some` on another entry. `None` at end of archive.
    pub fn read_next(&mut self) -> ArchiveResult<Option<ArchiveEntry>> {
        self.finish()?;

        loop {
            let mut reader = match self.archive_reader.take() {
                Some(reader) => reader,
                None => return Ok(None),
            };

            let mut block = [0u8; HEADER_LEN];
            let filled = fill_block(&mut reader, &mut block)?;

            if filled == 0 {
                return Ok(None);
            }
            if filled < HEADER_LEN {
                return Err(Error::TruncatedHeader);
            }

            let raw = RawHeader(&block);
            raw.validate_entry_magic()?;

            let name_field = raw.name_field()?.to_string();

            // A `//` entry is the string table: consume it and move on to
            // the entry that follows.
            if name_field.starts_with("//") {
                let size = raw.size()?;
                let mut data = vec![0u8; size as usize];
                reader.read_exact(&mut data).map_err(map_truncated)?;

                self.string_table = StringTable::parse(&data)?;
                self.archive_reader = Some(reader);
                continue;
            }

            let name = self.resolve_name(&name_field)?;

            let entry = ArchiveEntry {
                name,
                mtime: raw.mtime()?,
                uid: raw.uid()?,
                gid: raw.gid()?,
                mode: raw.mode()?,
                size: raw.size()?,
            };

            self.entry_reader = Some(reader.take(entry.size));

            return Ok(Some(entry));
        }
    }

    /// Finish reading the current entry.
    ///
    /// This advances the cursor past the current entry's payload if it
    /// hasn't been fully consumed.
    pub fn finish(&mut self) -> ArchiveResult<()> {
        if let Some(mut reader) = self.entry_reader.take() {
            let mut buffer = [0u8; 512];
            loop {
                if reader.read(&mut buffer)? == 0 {
                    break;
                }
            }

            if reader.limit() != 0 {
                return Err(Error::SizeMismatch);
            }

            self.archive_reader = Some(reader.into_inner());
        }

        Ok(())
    }

    fn resolve_name(&self, field: &str) -> ArchiveResult<String> {
        if let Some(digits) = field.strip_prefix('/') {
            let offset = digits
                .parse::<u64>()
                .map_err(|_| Error::BadHeaderNumber(field.to_string()))?;

            Ok(self.string_table.resolve(offset)?.to_string())
        } else {
            match field.split_once('/') {
                Some((name, "")) if !name.is_empty() => Ok(name.to_string()),
                _ => Err(Error::InvalidEntryName),
            }
        }
    }
}

/// Read as much of `block` as the reader can provide.
fn fill_block(reader: &mut impl Read, block: &mut [u8]) -> ArchiveResult<usize> {
    let mut filled = 0;

    while filled < block.len() {
        let count = reader.read(&mut block[filled..])?;
        if count == 0 {
            break;
        }
        filled += count;
    }

    Ok(filled)
}

fn map_truncated(error: std::io::Error) -> Error {
    if error.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::TruncatedHeader
    } else {
        Error::Io(error)
    }
}

impl<R: Read> Iterator for ArchiveReader<R> {
    type Item = ArchiveResult<ArchiveEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<R: Read> Read for ArchiveReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, std::io::Error> {
        if let Some(reader) = &mut self.entry_reader {
            reader.read(buf)
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no current archive entry to read from",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::io::Cursor};

    #[test]
    fn empty_archive() {
        let mut reader = ArchiveReader::new(Cursor::new(b"!<arch>\n".to_vec())).unwrap();
        assert!(reader.read_next().unwrap().is_none());
        // Idempotent at end of archive.
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn bad_magic() {
        assert!(matches!(
            ArchiveReader::new(Cursor::new(b"!<arch!\n".to_vec())),
            Err(Error::BadMagic)
        ));
        assert!(matches!(
            ArchiveReader::new(Cursor::new(b"!<ar".to_vec())),
            Err(Error::BadMagic)
        ));
    }

    #[test]
    fn truncated_header() {
        let mut data = b"!<arch>\n".to_vec();
        data.extend_from_slice(b"hello/          12");

        let mut reader = ArchiveReader::new(Cursor::new(data)).unwrap();
        assert!(matches!(reader.read_next(), Err(Error::TruncatedHeader)));
    }

    #[test]
    fn name_without_terminator_rejected() {
        let mut data = b"!<arch>\n".to_vec();
        // 16-byte name cell lacking the `/` terminator.
        data.extend_from_slice(b"hello           ");
        data.extend_from_slice(b"0           ");
        data.extend_from_slice(b"0     ");
        data.extend_from_slice(b"0     ");
        data.extend_from_slice(b"0       ");
        data.extend_from_slice(b"0         ");
        data.extend_from_slice(b"`\n");

        let mut reader = ArchiveReader::new(Cursor::new(data)).unwrap();
        assert!(matches!(reader.read_next(), Err(Error::InvalidEntryName)));
    }

    #[test]
    fn payload_window_is_bounded() {
        let mut data = b"!<arch>\n".to_vec();
        data.extend_from_slice(b"a/              ");
        data.extend_from_slice(b"5           ");
        data.extend_from_slice(b"0     ");
        data.extend_from_slice(b"0     ");
        data.extend_from_slice(b"33188   ");
        data.extend_from_slice(b"5         ");
        data.extend_from_slice(b"`\n");
        data.extend_from_slice(b"world");

        let mut reader = ArchiveReader::new(Cursor::new(data)).unwrap();
        let entry = reader.read_next().unwrap().unwrap();
        assert_eq!(entry.name, "a");
        assert_eq!(entry.size, 5);

        let mut payload = Vec::new();
        reader.read_to_end(&mut payload).unwrap();
        assert_eq!(payload, b"world");

        assert!(reader.read_next().unwrap().is_none());
    }
}
