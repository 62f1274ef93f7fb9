// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! SVR4 `ar`-style archive reading and writing.

This crate implements a dialect of the SVR4 `ar(5)` file format used as a
package payload container. An archive is the 8-byte magic `!<arch>\n`
followed by a sequence of entries, each a fixed 60-byte ASCII header and an
unpadded payload. Entries carry full POSIX metadata (mtime, uid, gid, mode,
size) so regular files, symlinks, directories, and FIFOs round-trip through
an archive.

Names of 15 bytes or fewer that contain no `/` are stored inline in the
header as `name/`. Longer or slash-containing names live in a string table,
a special entry named `//` written immediately after the magic; such entries
reference the table with `/` followed by a decimal byte offset.

Note this dialect intentionally omits the POSIX newline pad to even offsets,
so system `ar` tools will not read these archives.

[ArchiveWriter] appends entries from a staging tree. [ArchiveReader] behaves
like a cursor over entries: advance with [ArchiveReader::read_next], then
read the current entry's payload through the [std::io::Read] impl.
Filesystem materialization is provided by [ArchiveReader::extract] and
[ArchiveReader::extract_all].
*/

pub mod extract;
pub mod header;
pub use header::{ArchiveEntry, EntryKind, StringTable};
pub mod reader;
pub use reader::ArchiveReader;
pub mod writer;
pub use writer::ArchiveWriter;

/// Archive magic at offset 0.
pub const MAGIC: &[u8; 8] = b"!<arch>\n";

/// Per-entry trailer closing each 60-byte header.
pub const ENTRY_MAGIC: &[u8; 2] = b"`\n";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad magic value encountered")]
    BadMagic,

    #[error("invalid archive entry (bad entry magic)")]
    BadEntryMagic,

    #[error("truncated entry header")]
    TruncatedHeader,

    #[error("value in header is not an ASCII string")]
    BadHeaderString,

    #[error("value in header is not a decimal number: {0}")]
    BadHeaderNumber(String),

    #[error("invalid entry name (missing `/` terminator)")]
    InvalidEntryName,

    #[error("invalid string table entry: {0}")]
    InvalidStringTableEntry(String),

    #[error("no string table entry at offset {0}")]
    UnknownStringTableOffset(u64),

    #[error("value too large for header field")]
    ValueTooLarge,

    #[error("payload size does not match entry header")]
    SizeMismatch,
}

/// Result type for this crate.
pub type ArchiveResult<T> = Result<T, Error>;
