// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entry metadata and the fixed-width header codec.

use {
    crate::{ArchiveResult, Error, ENTRY_MAGIC},
    chrono::{DateTime, NaiveDateTime, Utc},
    std::{io::Write, os::unix::fs::MetadataExt},
};

/// Total size of an entry header on disk.
pub(crate) const HEADER_LEN: usize = 60;

const NAME_LEN: usize = 16;
const DATE_LEN: usize = 12;
const UID_LEN: usize = 6;
const GID_LEN: usize = 6;
const MODE_LEN: usize = 8;
const SIZE_LEN: usize = 10;

/// The content kind of an archive entry, derived from its mode bits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntryKind {
    Regular,
    Directory,
    Symlink,
    Fifo,
    /// Sockets and character/block devices. Never extracted.
    Other,
}

/// Metadata for a single archive entry.
///
/// `mode` holds the full POSIX mode, file-type bits included. For regular
/// files `size` is the payload length; for symlinks it is the byte length of
/// the link target; directories and FIFOs always have `size == 0`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArchiveEntry {
    pub name: String,
    pub mtime: i64,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub size: u64,
}

impl ArchiveEntry {
    /// Construct an entry from `lstat` metadata of a staged file.
    ///
    /// Only symlinks and regular files carry a size; a directory's on-disk
    /// block size is not meaningful in an archive.
    pub fn from_metadata(name: impl ToString, metadata: &std::fs::Metadata) -> Self {
        let mode = metadata.mode();

        let size = if metadata.file_type().is_symlink() || metadata.file_type().is_file() {
            metadata.len()
        } else {
            0
        };

        Self {
            name: name.to_string(),
            mtime: metadata.mtime(),
            uid: metadata.uid(),
            gid: metadata.gid(),
            mode,
            size,
        }
    }

    /// The content kind encoded in the mode's file-type bits.
    pub fn kind(&self) -> EntryKind {
        match self.mode & libc::S_IFMT {
            libc::S_IFREG => EntryKind::Regular,
            libc::S_IFDIR => EntryKind::Directory,
            libc::S_IFLNK => EntryKind::Symlink,
            libc::S_IFIFO => EntryKind::Fifo,
            _ => EntryKind::Other,
        }
    }

    /// The permission bits of the mode.
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    /// Modified time as a [DateTime].
    pub fn modified_time(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_utc(NaiveDateTime::from_timestamp(self.mtime, 0), Utc)
    }

    /// Write the 60-byte header for this entry.
    ///
    /// `name_field` is the already-encoded name cell: `name/` for short
    /// names, `/offset` for string-table references.
    pub(crate) fn write_header(
        &self,
        name_field: &str,
        writer: &mut impl Write,
    ) -> ArchiveResult<()> {
        let mut header = Vec::with_capacity(HEADER_LEN);

        push_field(&mut header, name_field, NAME_LEN)?;
        push_field(&mut header, &self.mtime.to_string(), DATE_LEN)?;
        push_field(&mut header, &self.uid.to_string(), UID_LEN)?;
        push_field(&mut header, &self.gid.to_string(), GID_LEN)?;
        push_field(&mut header, &self.mode.to_string(), MODE_LEN)?;
        push_field(&mut header, &self.size.to_string(), SIZE_LEN)?;
        header.extend_from_slice(ENTRY_MAGIC);

        writer.write_all(&header)?;

        Ok(())
    }
}

/// Append a left-justified, space-padded ASCII field.
fn push_field(buffer: &mut Vec<u8>, value: &str, width: usize) -> ArchiveResult<()> {
    if value.len() > width {
        return Err(Error::ValueTooLarge);
    }

    buffer.extend_from_slice(value.as_bytes());
    buffer.resize(buffer.len() + (width - value.len()), b' ');

    Ok(())
}

/// A borrowed view over a raw 60-byte header with typed field accessors.
///
/// Numeric fields are decimal digits followed only by trailing spaces;
/// anything else is rejected.
pub(crate) struct RawHeader<'a>(pub(crate) &'a [u8; HEADER_LEN]);

impl<'a> RawHeader<'a> {
    pub(crate) fn validate_entry_magic(&self) -> ArchiveResult<()> {
        if &self.0[58..60] == ENTRY_MAGIC {
            Ok(())
        } else {
            Err(Error::BadEntryMagic)
        }
    }

    /// The raw name cell, trailing spaces stripped.
    pub(crate) fn name_field(&self) -> ArchiveResult<&'a str> {
        field_str(&self.0[0..NAME_LEN])
    }

    pub(crate) fn mtime(&self) -> ArchiveResult<i64> {
        let s = field_str(&self.0[16..28])?;
        s.parse::<i64>()
            .map_err(|_| Error::BadHeaderNumber(s.to_string()))
    }

    pub(crate) fn uid(&self) -> ArchiveResult<u32> {
        parse_u32(&self.0[28..34])
    }

    pub(crate) fn gid(&self) -> ArchiveResult<u32> {
        parse_u32(&self.0[34..40])
    }

    pub(crate) fn mode(&self) -> ArchiveResult<u32> {
        parse_u32(&self.0[40..48])
    }

    pub(crate) fn size(&self) -> ArchiveResult<u64> {
        let s = field_str(&self.0[48..58])?;
        s.parse::<u64>()
            .map_err(|_| Error::BadHeaderNumber(s.to_string()))
    }
}

fn field_str(data: &[u8]) -> ArchiveResult<&str> {
    let s = std::str::from_utf8(data).map_err(|_| Error::BadHeaderString)?;

    Ok(s.trim_end_matches(' '))
}

fn parse_u32(data: &[u8]) -> ArchiveResult<u32> {
    let s = field_str(data)?;

    s.parse::<u32>()
        .map_err(|_| Error::BadHeaderNumber(s.to_string()))
}

/// The ordered list of long filenames backing `/offset` header names.
///
/// The serialized payload is each name followed by `/\n`; the offset of
/// entry *i* is the byte length of all preceding serialized names.
#[derive(Clone, Debug, Default)]
pub struct StringTable {
    names: Vec<String>,
}

impl StringTable {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Serialized payload length in bytes.
    pub fn payload_len(&self) -> u64 {
        self.names.iter().map(|name| name.len() as u64 + 2).sum()
    }

    /// Add a name, returning the offset to store in the entry header.
    pub fn register(&mut self, name: &str) -> u64 {
        let offset = self.payload_len();
        self.names.push(name.to_string());

        offset
    }

    /// Resolve a `/offset` header reference back to a name.
    pub fn resolve(&self, offset: u64) -> ArchiveResult<&str> {
        let mut cursor = 0u64;

        for name in &self.names {
            if cursor == offset {
                return Ok(name);
            }
            cursor += name.len() as u64 + 2;
        }

        Err(Error::UnknownStringTableOffset(offset))
    }

    /// Parse a table from the payload of a `//` entry.
    pub fn parse(data: &[u8]) -> ArchiveResult<Self> {
        let text = std::str::from_utf8(data).map_err(|_| Error::BadHeaderString)?;
        let mut table = Self::default();

        for line in text.split('\n') {
            if line.is_empty() {
                continue;
            }

            let name = line
                .strip_suffix('/')
                .ok_or_else(|| Error::InvalidStringTableEntry(line.to_string()))?;
            table.names.push(name.to_string());
        }

        Ok(table)
    }

    /// Write the serialized payload.
    pub fn write_payload(&self, writer: &mut impl Write) -> std::io::Result<()> {
        for name in &self.names {
            writer.write_all(name.as_bytes())?;
            writer.write_all(b"/\n")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_table_offsets() {
        let mut table = StringTable::default();

        assert_eq!(table.register("first_long_name.txt"), 0);
        assert_eq!(table.register("second"), 21);
        assert_eq!(table.register("third"), 29);

        assert_eq!(table.resolve(0).unwrap(), "first_long_name.txt");
        assert_eq!(table.resolve(21).unwrap(), "second");
        assert_eq!(table.resolve(29).unwrap(), "third");
        assert!(matches!(
            table.resolve(1),
            Err(Error::UnknownStringTableOffset(1))
        ));
    }

    #[test]
    fn string_table_round_trip() {
        let mut table = StringTable::default();
        table.register("a_very_long_filename_indeed.txt");
        table.register("usr/bin/tool");

        let mut payload = Vec::new();
        table.write_payload(&mut payload).unwrap();
        assert_eq!(
            payload,
            b"a_very_long_filename_indeed.txt/\nusr/bin/tool/\n"
        );

        let parsed = StringTable::parse(&payload).unwrap();
        assert_eq!(parsed.resolve(0).unwrap(), "a_very_long_filename_indeed.txt");
        assert_eq!(parsed.resolve(33).unwrap(), "usr/bin/tool");
    }

    #[test]
    fn string_table_rejects_unterminated_names() {
        assert!(matches!(
            StringTable::parse(b"missing-slash\n"),
            Err(Error::InvalidStringTableEntry(_))
        ));
    }

    #[test]
    fn entry_kind_from_mode() {
        let mut entry = ArchiveEntry {
            name: "x".to_string(),
            mtime: 0,
            uid: 0,
            gid: 0,
            mode: libc::S_IFREG | 0o644,
            size: 0,
        };
        assert_eq!(entry.kind(), EntryKind::Regular);
        assert_eq!(entry.permissions(), 0o644);

        entry.mode = libc::S_IFDIR | 0o755;
        assert_eq!(entry.kind(), EntryKind::Directory);

        entry.mode = libc::S_IFLNK | 0o777;
        assert_eq!(entry.kind(), EntryKind::Symlink);

        entry.mode = libc::S_IFIFO | 0o600;
        assert_eq!(entry.kind(), EntryKind::Fifo);

        entry.mode = libc::S_IFSOCK | 0o600;
        assert_eq!(entry.kind(), EntryKind::Other);
    }

    #[test]
    fn header_write_and_parse() {
        let entry = ArchiveEntry {
            name: "hello".to_string(),
            mtime: 1000000000,
            uid: 10,
            gid: 20,
            mode: libc::S_IFREG | 0o644,
            size: 5,
        };

        let mut buffer = Vec::new();
        entry.write_header("hello/", &mut buffer).unwrap();
        assert_eq!(buffer.len(), HEADER_LEN);

        let raw: &[u8; HEADER_LEN] = buffer.as_slice().try_into().unwrap();
        let raw = RawHeader(raw);
        raw.validate_entry_magic().unwrap();
        assert_eq!(raw.name_field().unwrap(), "hello/");
        assert_eq!(raw.mtime().unwrap(), 1000000000);
        assert_eq!(raw.uid().unwrap(), 10);
        assert_eq!(raw.gid().unwrap(), 20);
        assert_eq!(raw.mode().unwrap(), libc::S_IFREG | 0o644);
        assert_eq!(raw.size().unwrap(), 5);
    }
}
