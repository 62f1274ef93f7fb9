// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Filesystem and line-parsing helpers shared across the crate. */

use {
    crate::{MpkgError, Result},
    std::{
        io::{Read, Write},
        path::Path,
    },
};

/// The whitespace set recognized in manifest and catalog lines: tab,
/// newline, vertical tab, form feed, carriage return, space.
pub const LINE_WHITESPACE: &[char] = &['\t', '\n', '\x0B', '\x0C', '\r', ' '];

/// Tokenize a line on [LINE_WHITESPACE], dropping empty tokens.
pub fn split_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(LINE_WHITESPACE).filter(|token| !token.is_empty())
}

/// Copy `src` to `dst` in 512-byte chunks, creating or truncating `dst`.
///
/// Returns the number of bytes copied.
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    let mut input = std::fs::File::open(src).map_err(|e| MpkgError::path_io("open", src, e))?;
    let mut output =
        std::fs::File::create(dst).map_err(|e| MpkgError::path_io("open", dst, e))?;

    let mut buffer = [0u8; 512];
    let mut copied = 0u64;

    loop {
        let count = input
            .read(&mut buffer)
            .map_err(|e| MpkgError::path_io("read", src, e))?;
        if count == 0 {
            break;
        }

        output
            .write_all(&buffer[..count])
            .map_err(|e| MpkgError::path_io("write", dst, e))?;
        copied += count as u64;
    }

    Ok(copied)
}

/// Create a directory and any missing parents.
pub fn create_dirs(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| MpkgError::path_io("mkdir", path, e))
}

/// Copy `src` into a fresh uniquely-named file under `dir`, creating the
/// directory as needed.
///
/// The returned guard unlinks the copy when dropped.
pub fn copy_to_tmp(dir: &Path, src: &Path) -> Result<tempfile::NamedTempFile> {
    create_dirs(dir)?;

    let prefix = src
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| format!("{}.", name))
        .unwrap_or_else(|| "tmp.".to_string());

    let file = tempfile::Builder::new()
        .prefix(&prefix)
        .tempfile_in(dir)
        .map_err(|e| MpkgError::path_io("open", dir, e))?;

    copy_file(src, file.path())?;

    Ok(file)
}

/// Whether a directory contains no entries.
pub fn is_empty_dir(path: &Path) -> Result<bool> {
    let mut entries =
        std::fs::read_dir(path).map_err(|e| MpkgError::path_io("opendir", path, e))?;

    match entries.next() {
        None => Ok(true),
        Some(Ok(_)) => Ok(false),
        Some(Err(e)) => Err(MpkgError::path_io("readdir", path, e)),
    }
}
