// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The installed-package database.
//!
//! Records live under `<root>/var/db/mpkg`, one directory per package:
//!
//! ```text
//! <root>/var/db/mpkg/<name>/manifest
//! <root>/var/db/mpkg/<name>/automatic     (marker, optional)
//! ```
//!
//! The `automatic` marker means the package was installed to satisfy a
//! dependency rather than by explicit request.

use {
    crate::{io, manifest::Manifest, MpkgError, Result},
    std::path::{Path, PathBuf},
};

/// Database location relative to the target root.
pub const DB_RELATIVE_PATH: &str = "var/db/mpkg";

/// One installed package.
#[derive(Clone, Debug)]
pub struct InstalledRecord {
    pub manifest: Manifest,
    pub automatic: bool,
}

/// The set of records under one root's database directory.
#[derive(Debug)]
pub struct InstalledDb {
    path: PathBuf,
    records: Vec<InstalledRecord>,
}

impl InstalledDb {
    /// The database directory for a root.
    pub fn db_path(root: &Path) -> PathBuf {
        root.join(DB_RELATIVE_PATH)
    }

    /// Open the database for a root, creating the directory tree if absent.
    pub fn open(root: &Path) -> Result<Self> {
        let path = Self::db_path(root);

        if !path.is_dir() {
            io::create_dirs(&path)?;
        }

        let mut db = Self {
            path,
            records: Vec::new(),
        };
        db.load()?;

        Ok(db)
    }

    fn load(&mut self) -> Result<()> {
        self.records.clear();

        let entries = std::fs::read_dir(&self.path)
            .map_err(|e| MpkgError::path_io("opendir", &self.path, e))?;

        let mut subdirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MpkgError::path_io("readdir", &self.path, e))?;
            if entry.path().is_dir() {
                subdirs.push(entry.path());
            }
        }
        subdirs.sort();

        for subdir in subdirs {
            let manifest_path = subdir.join("manifest");
            if !manifest_path.is_file() {
                continue;
            }

            let manifest = Manifest::parse_file(&manifest_path)?;
            let automatic = subdir.join("automatic").exists();

            self.records.push(InstalledRecord {
                manifest,
                automatic,
            });
        }

        Ok(())
    }

    /// Discard the in-memory records and re-read them from disk.
    ///
    /// The worker re-enters itself to satisfy dependencies; on return it
    /// must observe the records the sub-transaction wrote.
    pub fn reload(&mut self) -> Result<()> {
        self.load()
    }

    /// Look up an installed package by name.
    pub fn find(&self, name: &str) -> Option<&InstalledRecord> {
        self.records
            .iter()
            .find(|record| record.manifest.name == name)
    }

    /// Installed records, ordered by package name.
    pub fn records(&self) -> &[InstalledRecord] {
        &self.records
    }

    /// The database directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write (or rewrite) the on-disk record for a package.
    ///
    /// The in-memory set is not touched; call [Self::reload] to observe the
    /// change.
    pub fn write_record(&self, manifest: &Manifest, automatic: bool) -> Result<()> {
        let record_dir = self.path.join(&manifest.name);
        io::create_dirs(&record_dir)?;

        manifest.emit_file(&record_dir.join("manifest"))?;

        let marker = record_dir.join("automatic");
        if automatic {
            std::fs::File::create(&marker).map_err(|e| MpkgError::path_io("open", &marker, e))?;
        } else if marker.exists() {
            std::fs::remove_file(&marker)
                .map_err(|e| MpkgError::path_io("unlink", &marker, e))?;
        }

        Ok(())
    }

    /// Remove the on-disk record for a package.
    pub fn remove_record(&self, name: &str) -> Result<()> {
        let record_dir = self.path.join(name);

        std::fs::remove_dir_all(&record_dir)
            .map_err(|e| MpkgError::path_io("rmdir", &record_dir, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(name: &str, release: u32) -> Manifest {
        Manifest {
            name: name.to_string(),
            release,
            depends: Vec::new(),
            nodes: Vec::new(),
            script: None,
        }
    }

    #[test]
    fn open_creates_the_tree() {
        let root = tempfile::tempdir().unwrap();
        let db = InstalledDb::open(root.path()).unwrap();

        assert!(root.path().join("var/db/mpkg").is_dir());
        assert!(db.records().is_empty());
    }

    #[test]
    fn records_round_trip_with_automatic_flag() {
        let root = tempfile::tempdir().unwrap();
        let mut db = InstalledDb::open(root.path()).unwrap();

        db.write_record(&manifest("zlib", 3), true).unwrap();
        db.write_record(&manifest("hello", 1), false).unwrap();
        db.reload().unwrap();

        assert_eq!(db.records().len(), 2);
        // Name order, not write order.
        assert_eq!(db.records()[0].manifest.name, "hello");
        assert_eq!(db.records()[1].manifest.name, "zlib");

        assert!(db.find("zlib").unwrap().automatic);
        assert!(!db.find("hello").unwrap().automatic);
        assert_eq!(db.find("zlib").unwrap().manifest.release, 3);
        assert!(db.find("absent").is_none());
    }

    #[test]
    fn rewriting_a_record_can_clear_the_marker() {
        let root = tempfile::tempdir().unwrap();
        let mut db = InstalledDb::open(root.path()).unwrap();

        db.write_record(&manifest("pkg", 1), true).unwrap();
        db.write_record(&manifest("pkg", 2), false).unwrap();
        db.reload().unwrap();

        let record = db.find("pkg").unwrap();
        assert!(!record.automatic);
        assert_eq!(record.manifest.release, 2);
    }

    #[test]
    fn subdirectories_without_manifest_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        let mut db = InstalledDb::open(root.path()).unwrap();

        std::fs::create_dir(db.path().join("stray")).unwrap();
        std::fs::write(db.path().join("not-a-dir"), b"").unwrap();
        db.reload().unwrap();

        assert!(db.records().is_empty());
    }

    #[test]
    fn remove_record_deletes_the_directory() {
        let root = tempfile::tempdir().unwrap();
        let mut db = InstalledDb::open(root.path()).unwrap();

        db.write_record(&manifest("pkg", 1), false).unwrap();
        db.remove_record("pkg").unwrap();
        db.reload().unwrap();

        assert!(db.find("pkg").is_none());
        assert!(!db.path().join("pkg").exists());
    }
}
