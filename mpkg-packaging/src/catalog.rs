// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The repository catalog.
//!
//! The catalog is the repository-wide index, one record per line:
//!
//! ```text
//! name|release|dep1,dep2
//! ```
//!
//! The dependency list may be empty. Blank lines and `#` comment lines are
//! skipped on read; names are unique within a catalog.

use {
    crate::{io, MpkgError, Result},
    std::{io::Write, path::Path},
};

/// One catalog record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub release: u32,
    pub depends: Vec<String>,
}

/// An ordered collection of catalog entries, unique by name.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Append an entry, rejecting duplicate names.
    pub fn push(&mut self, entry: CatalogEntry) -> Result<()> {
        if self.find(&entry.name).is_some() {
            return Err(MpkgError::DuplicateCatalogEntry(entry.name));
        }

        self.entries.push(entry);

        Ok(())
    }

    /// Look up an entry by package name.
    pub fn find(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Iterate entries in insertion order.
    pub fn iter_entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Parse `<repo>/catalog`.
    pub fn parse_file(repo: &Path) -> Result<Self> {
        let path = repo.join("catalog");
        let text = std::fs::read_to_string(&path)
            .map_err(|e| MpkgError::path_io("open", &path, e))?;

        Self::parse_str(&path.display().to_string(), &text)
    }

    /// Parse catalog text. `path` is used for error context only.
    pub fn parse_str(path: &str, text: &str) -> Result<Self> {
        let error = |line: usize, message: String| MpkgError::CatalogParse {
            path: path.to_string(),
            line,
            message,
        };

        let mut catalog = Self::default();

        for (index, line) in text.lines().enumerate() {
            let lineno = index + 1;

            match io::split_fields(line).next() {
                None => continue,
                Some(token) if token.starts_with('#') => continue,
                _ => {}
            }

            let trimmed = line.trim_matches(io::LINE_WHITESPACE);
            let fields = trimmed.split('|').collect::<Vec<_>>();
            if fields.len() != 3 {
                return Err(error(lineno, "malformed record".to_string()));
            }

            let name = fields[0];
            if name.is_empty() {
                return Err(error(lineno, "empty field".to_string()));
            }

            if fields[1].is_empty() {
                return Err(error(lineno, "empty field".to_string()));
            }
            let release = fields[1].parse::<u32>().map_err(|_| {
                error(lineno, format!("{}: invalid release number", fields[1]))
            })?;

            let depends = fields[2]
                .split(',')
                .filter(|dep| !dep.is_empty())
                .map(|dep| dep.to_string())
                .collect();

            catalog
                .push(CatalogEntry {
                    name: name.to_string(),
                    release,
                    depends,
                })
                .map_err(|_| error(lineno, format!("{}: duplicate entry", name)))?;
        }

        Ok(catalog)
    }

    /// Write the catalog in its canonical text form.
    pub fn emit(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writeln!(writer, "#")?;
        writeln!(writer, "# Created by mpkg-repo")?;
        writeln!(writer, "# /!\\ DO NOT EDIT!!! /!\\")?;
        writeln!(writer, "#")?;
        writeln!(writer)?;

        for entry in &self.entries {
            writeln!(
                writer,
                "{}|{}|{}",
                entry.name,
                entry.release,
                entry.depends.join(",")
            )?;
        }

        Ok(())
    }

    /// Emit the catalog to `<repo>/catalog`.
    pub fn emit_file(&self, repo: &Path) -> Result<()> {
        let path = repo.join("catalog");
        let mut file =
            std::fs::File::create(&path).map_err(|e| MpkgError::path_io("open", &path, e))?;

        self.emit(&mut file)
            .map_err(|e| MpkgError::path_io("write", &path, e))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, indoc::indoc};

    const SAMPLE: &str = indoc! {"
        #
        # Created by mpkg-repo
        # /!\\ DO NOT EDIT!!! /!\\
        #

        hello|2|libgreet,terminfo
        libgreet|1|
        terminfo|3|
    "};

    #[test]
    fn parse_sample() {
        let catalog = Catalog::parse_str("repo/catalog", SAMPLE).unwrap();

        assert_eq!(catalog.len(), 3);

        let hello = catalog.find("hello").unwrap();
        assert_eq!(hello.release, 2);
        assert_eq!(hello.depends, vec!["libgreet", "terminfo"]);

        let libgreet = catalog.find("libgreet").unwrap();
        assert_eq!(libgreet.release, 1);
        assert!(libgreet.depends.is_empty());

        assert!(catalog.find("missing").is_none());
    }

    #[test]
    fn parse_emit_parse_is_identity() {
        let catalog = Catalog::parse_str("c", SAMPLE).unwrap();

        let mut emitted = Vec::new();
        catalog.emit(&mut emitted).unwrap();

        let reparsed = Catalog::parse_str("c", std::str::from_utf8(&emitted).unwrap()).unwrap();
        assert_eq!(
            catalog.iter_entries().collect::<Vec<_>>(),
            reparsed.iter_entries().collect::<Vec<_>>()
        );
    }

    #[test]
    fn empty_fields_are_rejected() {
        let err = Catalog::parse_str("c", "|1|\n").unwrap_err();
        assert_eq!(err.to_string(), "c:1: empty field");

        let err = Catalog::parse_str("c", "hello||\n").unwrap_err();
        assert_eq!(err.to_string(), "c:1: empty field");

        let err = Catalog::parse_str("c", "hello|1\n").unwrap_err();
        assert_eq!(err.to_string(), "c:1: malformed record");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Catalog::parse_str("c", "a|1|\na|2|\n").unwrap_err();
        assert_eq!(err.to_string(), "c:2: a: duplicate entry");
    }
}
