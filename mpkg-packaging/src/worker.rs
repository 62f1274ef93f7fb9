// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-transaction state machine.
//!
//! One [Worker] handles one (package, action) pair. The requested action is
//! normalized against the catalog and the installed database before
//! execution:
//!
//! - install/update first resolve dependencies depth-first (installing
//!   missing ones as automatic sub-transactions), then become INSTALL when
//!   the package is absent, UPDATE when its installed release is older than
//!   the catalog's, and a no-op otherwise;
//! - uninstall becomes a no-op when any other installed package depends on
//!   the target.
//!
//! Each executed action is bracketed by its script phases. Script failures
//! and per-file removal failures are warnings; everything else aborts the
//! transaction.

use {
    crate::{
        catalog::Catalog,
        db::InstalledDb,
        io,
        manifest::{Manifest, NodeKind},
        scripts, Config, MpkgError, Result,
    },
    ar_archive::ArchiveReader,
};

/// The transaction verb.
///
/// `Install` and `Update` are interchangeable as requested actions; the
/// worker decides which one actually applies.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Install,
    Update,
    Uninstall,
    None,
}

/// A single-package transaction against one root.
pub struct Worker<'a> {
    config: &'a Config,
    catalog: &'a Catalog,
    db: &'a mut InstalledDb,
    package: String,
    action: Action,
    automatic: bool,
    /// Packages whose resolution is in progress further up the stack.
    chain: Vec<String>,
}

impl<'a> Worker<'a> {
    pub fn new(
        config: &'a Config,
        catalog: &'a Catalog,
        db: &'a mut InstalledDb,
        package: impl ToString,
        action: Action,
        automatic: bool,
    ) -> Self {
        Self {
            config,
            catalog,
            db,
            package: package.to_string(),
            action,
            automatic,
            chain: Vec::new(),
        }
    }

    /// Normalize the requested action and execute it.
    pub fn execute(&mut self) -> Result<()> {
        let mut record_automatic = self.automatic;

        match self.action {
            Action::Install | Action::Update => {
                let entry = self
                    .catalog
                    .find(&self.package)
                    .ok_or_else(|| MpkgError::PackageNotFound(self.package.clone()))?;
                let release = entry.release;
                let depends = entry.depends.clone();

                self.resolve_depends(&depends)?;

                self.action = match self.db.find(&self.package) {
                    None => Action::Install,
                    Some(record) if record.manifest.release < release => {
                        record_automatic = record.automatic;
                        Action::Update
                    }
                    Some(_) => Action::None,
                };
            }
            Action::Uninstall => {
                if self.db.find(&self.package).is_none() {
                    return Err(MpkgError::NotInstalled(self.package.clone()));
                }

                if self.has_reverse_depends() {
                    log::info!(
                        "{}: required by another installed package, keeping",
                        self.package
                    );
                    self.action = Action::None;
                }
            }
            Action::None => {}
        }

        if self.config.dry_run {
            match self.action {
                Action::Install => log::info!("would install {}", self.package),
                Action::Update => log::info!("would update {}", self.package),
                Action::Uninstall => log::info!("would remove {}", self.package),
                Action::None => log::info!("{}: nothing to do", self.package),
            }

            return Ok(());
        }

        match self.action {
            Action::Install => {
                self.script("preinstall");
                self.install(record_automatic)?;
                self.script("postinstall");
            }
            Action::Update => {
                self.script("preupdate");
                self.uninstall()?;
                self.install(record_automatic)?;
                self.script("postupdate");
            }
            Action::Uninstall => {
                self.script("preuninstall");
                self.uninstall()?;
                self.script("postuninstall");
            }
            Action::None => {}
        }

        Ok(())
    }

    /// Ensure every dependency is installed at the catalog release or
    /// newer, recursing for missing ones.
    ///
    /// After every sub-install the database is reloaded and the scan
    /// restarts from the first dependency, so transitive installs are
    /// observed.
    fn resolve_depends(&mut self, depends: &[String]) -> Result<()> {
        'rescan: loop {
            for dep in depends {
                let entry = self
                    .catalog
                    .find(dep)
                    .ok_or_else(|| MpkgError::PackageNotFound(dep.clone()))?;
                let release = entry.release;

                if let Some(record) = self.db.find(dep) {
                    if record.manifest.release >= release {
                        log::info!("{} depends on: {} - found", self.package, dep);
                        continue;
                    }
                }
                log::info!("{} depends on: {} - not found", self.package, dep);

                if *dep == self.package || self.chain.contains(dep) {
                    let mut cycle = self.chain.clone();
                    cycle.push(self.package.clone());
                    cycle.push(dep.clone());

                    return Err(MpkgError::DependencyCycle(cycle.join(" -> ")));
                }

                let mut chain = self.chain.clone();
                chain.push(self.package.clone());

                let mut sub = Worker {
                    config: self.config,
                    catalog: self.catalog,
                    db: &mut *self.db,
                    package: dep.clone(),
                    action: self.action,
                    automatic: true,
                    chain,
                };
                sub.execute()?;

                self.db.reload()?;

                let satisfied = self
                    .db
                    .find(dep)
                    .map(|record| record.manifest.release >= release)
                    .unwrap_or(false);
                if !satisfied {
                    return Err(MpkgError::DependencyUnsatisfied(dep.clone()));
                }

                continue 'rescan;
            }

            return Ok(());
        }
    }

    /// Whether any other installed package declares this one as a
    /// dependency.
    fn has_reverse_depends(&self) -> bool {
        self.db.records().iter().any(|record| {
            record.manifest.name != self.package
                && record
                    .manifest
                    .depends
                    .iter()
                    .any(|depend| depend.name == self.package)
        })
    }

    fn script(&self, phase: &str) {
        scripts::run_script(&self.config.root, &self.config.repo, &self.package, phase);
    }

    fn install(&mut self, automatic: bool) -> Result<()> {
        let package_dir = self.config.repo.join(&self.package);
        let archive_path = package_dir.join("data.a");

        log::info!("installing {}", self.package);

        let mut reader = ArchiveReader::open(&archive_path)
            .map_err(|e| MpkgError::archive(&archive_path, e))?;
        reader
            .extract_all(&self.config.root)
            .map_err(|e| MpkgError::archive(&archive_path, e))?;

        let manifest = Manifest::parse_file(&package_dir.join("manifest"))?;
        self.db.write_record(&manifest, automatic)?;

        Ok(())
    }

    fn uninstall(&mut self) -> Result<()> {
        let record = self
            .db
            .find(&self.package)
            .ok_or_else(|| MpkgError::NotInstalled(self.package.clone()))?;
        let nodes = record.manifest.nodes.clone();

        log::info!("removing {}", self.package);

        for node in nodes.iter().filter(|node| node.kind != NodeKind::Dir) {
            let path = self.config.root.join(&node.path);
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("unlink: {}: {}", path.display(), e);
            }
        }

        // Directories are visited only once every file is gone, deepest
        // first so emptied parents can go too.
        for node in nodes
            .iter()
            .rev()
            .filter(|node| node.kind == NodeKind::Dir)
        {
            let path = self.config.root.join(&node.path);

            match io::is_empty_dir(&path) {
                Ok(true) => {
                    if let Err(e) = std::fs::remove_dir(&path) {
                        log::warn!("rmdir: {}: {}", path.display(), e);
                    }
                }
                Ok(false) => {}
                Err(e) => log::warn!("{}", e),
            }
        }

        self.db.remove_record(&self.package)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{manifest::Manifest, repository},
        std::path::{Path, PathBuf},
    };

    /// Build a package in `repo` from an inline manifest, staging file
    /// nodes with placeholder content.
    fn make_package(repo: &Path, work: &Path, manifest_text: &str) {
        let manifest = Manifest::parse_str("inline", manifest_text).unwrap();

        let proto = work.join(format!("proto-{}", manifest.name));
        std::fs::create_dir_all(&proto).unwrap();

        for node in &manifest.nodes {
            match node.kind {
                NodeKind::Dir => std::fs::create_dir_all(proto.join(&node.path)).unwrap(),
                NodeKind::File | NodeKind::Config => {
                    std::fs::write(proto.join(&node.path), node.path.as_bytes()).unwrap()
                }
            }
        }

        let manifest_path = work.join(format!("{}.manifest", manifest.name));
        std::fs::write(&manifest_path, manifest_text).unwrap();

        repository::create_package(&manifest_path, &proto, repo).unwrap();
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        config: Config,
        catalog: Catalog,
    }

    impl Fixture {
        fn new(manifests: &[&str]) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let repo = tmp.path().join("repo");
            let root = tmp.path().join("root");
            std::fs::create_dir_all(&repo).unwrap();
            std::fs::create_dir_all(&root).unwrap();

            for text in manifests {
                make_package(&repo, tmp.path(), text);
            }
            repository::publish(&repo).unwrap();

            let catalog = Catalog::parse_file(&repo).unwrap();

            Self {
                _tmp: tmp,
                config: Config {
                    root,
                    repo,
                    dry_run: false,
                },
                catalog,
            }
        }

        fn db(&self) -> InstalledDb {
            InstalledDb::open(&self.config.root).unwrap()
        }

        fn run(&self, db: &mut InstalledDb, package: &str, action: Action) -> Result<()> {
            let mut worker = Worker::new(&self.config, &self.catalog, db, package, action, false);
            worker.execute()
        }

        fn root_path(&self, rel: &str) -> PathBuf {
            self.config.root.join(rel)
        }
    }

    #[test]
    fn install_resolves_dependencies() {
        let fixture = Fixture::new(&[
            "package a\nrelease 1\ndepend b\nfile a.txt\n",
            "package b\nrelease 1\nfile b.txt\n",
        ]);
        let mut db = fixture.db();

        fixture.run(&mut db, "a", Action::Install).unwrap();
        db.reload().unwrap();

        assert!(fixture.root_path("a.txt").is_file());
        assert!(fixture.root_path("b.txt").is_file());

        assert!(!db.find("a").unwrap().automatic);
        assert!(db.find("b").unwrap().automatic);
    }

    #[test]
    fn install_resolves_transitive_dependencies() {
        let fixture = Fixture::new(&[
            "package a\nrelease 1\ndepend b\nfile a.txt\n",
            "package b\nrelease 1\ndepend c\nfile b.txt\n",
            "package c\nrelease 1\nfile c.txt\n",
        ]);
        let mut db = fixture.db();

        fixture.run(&mut db, "a", Action::Install).unwrap();
        db.reload().unwrap();

        for name in ["a", "b", "c"] {
            assert!(db.find(name).is_some(), "{} missing from db", name);
            assert!(fixture.root_path(&format!("{}.txt", name)).is_file());
        }
        assert!(db.find("b").unwrap().automatic);
        assert!(db.find("c").unwrap().automatic);
    }

    #[test]
    fn install_of_current_release_is_a_noop() {
        let fixture = Fixture::new(&["package a\nrelease 1\nfile a.txt\n"]);
        let mut db = fixture.db();

        fixture.run(&mut db, "a", Action::Install).unwrap();
        db.reload().unwrap();

        // Remove the payload behind mpkg's back; a no-op must not restore it.
        std::fs::remove_file(fixture.root_path("a.txt")).unwrap();

        fixture.run(&mut db, "a", Action::Install).unwrap();
        assert!(!fixture.root_path("a.txt").exists());
    }

    #[test]
    fn missing_package_aborts() {
        let fixture = Fixture::new(&[]);
        let mut db = fixture.db();

        assert!(matches!(
            fixture.run(&mut db, "ghost", Action::Install),
            Err(MpkgError::PackageNotFound(name)) if name == "ghost"
        ));
    }

    #[test]
    fn update_replaces_lower_release() {
        let fixture = Fixture::new(&["package a\nrelease 2\nfile a.txt\n"]);
        let mut db = fixture.db();

        // Seed an older installed record by hand.
        let old = Manifest::parse_str("old", "package a\nrelease 1\nfile a.txt\n").unwrap();
        db.write_record(&old, true).unwrap();
        db.reload().unwrap();
        std::fs::write(fixture.root_path("a.txt"), b"stale").unwrap();

        fixture.run(&mut db, "a", Action::Update).unwrap();
        db.reload().unwrap();

        let record = db.find("a").unwrap();
        assert_eq!(record.manifest.release, 2);
        // The pre-update automatic flag survives the update.
        assert!(record.automatic);
        assert_eq!(
            std::fs::read(fixture.root_path("a.txt")).unwrap(),
            b"a.txt"
        );
    }

    #[test]
    fn uninstall_removes_files_and_empty_directories() {
        let fixture = Fixture::new(&[concat!(
            "package a\nrelease 1\n",
            "dir usr\ndir usr/bin\nfile usr/bin/a\nconfig etc-a.conf\n"
        )]);
        let mut db = fixture.db();

        fixture.run(&mut db, "a", Action::Install).unwrap();
        db.reload().unwrap();
        assert!(fixture.root_path("usr/bin/a").is_file());

        fixture.run(&mut db, "a", Action::Uninstall).unwrap();
        db.reload().unwrap();

        assert!(db.find("a").is_none());
        assert!(!fixture.root_path("usr/bin/a").exists());
        // Config nodes are removed like files.
        assert!(!fixture.root_path("etc-a.conf").exists());
        // Emptied directories are pruned, children before parents.
        assert!(!fixture.root_path("usr/bin").exists());
        assert!(!fixture.root_path("usr").exists());
    }

    #[test]
    fn uninstall_leaves_shared_directories() {
        let fixture = Fixture::new(&["package a\nrelease 1\ndir usr\nfile usr/a\n"]);
        let mut db = fixture.db();

        fixture.run(&mut db, "a", Action::Install).unwrap();
        db.reload().unwrap();

        // A foreign file keeps the directory alive.
        std::fs::write(fixture.root_path("usr/other"), b"").unwrap();

        fixture.run(&mut db, "a", Action::Uninstall).unwrap();

        assert!(!fixture.root_path("usr/a").exists());
        assert!(fixture.root_path("usr").is_dir());
        assert!(fixture.root_path("usr/other").is_file());
    }

    #[test]
    fn uninstall_blocked_by_reverse_dependency() {
        let fixture = Fixture::new(&[
            "package a\nrelease 1\ndepend b\nfile a.txt\n",
            "package b\nrelease 1\nfile b.txt\n",
        ]);
        let mut db = fixture.db();

        fixture.run(&mut db, "a", Action::Install).unwrap();
        db.reload().unwrap();

        // Downgraded to a no-op, not an error.
        fixture.run(&mut db, "b", Action::Uninstall).unwrap();
        db.reload().unwrap();

        assert!(db.find("b").is_some());
        assert!(fixture.root_path("b.txt").is_file());
    }

    #[test]
    fn uninstall_of_absent_package_errors() {
        let fixture = Fixture::new(&[]);
        let mut db = fixture.db();

        assert!(matches!(
            fixture.run(&mut db, "ghost", Action::Uninstall),
            Err(MpkgError::NotInstalled(name)) if name == "ghost"
        ));
    }

    #[test]
    fn dependency_cycles_abort() {
        let fixture = Fixture::new(&[
            "package a\nrelease 1\ndepend b\nfile a.txt\n",
            "package b\nrelease 1\ndepend a\nfile b.txt\n",
        ]);
        let mut db = fixture.db();

        assert!(matches!(
            fixture.run(&mut db, "a", Action::Install),
            Err(MpkgError::DependencyCycle(_))
        ));
    }

    #[test]
    fn self_dependency_aborts() {
        let fixture = Fixture::new(&["package a\nrelease 1\ndepend a\nfile a.txt\n"]);
        let mut db = fixture.db();

        assert!(matches!(
            fixture.run(&mut db, "a", Action::Install),
            Err(MpkgError::DependencyCycle(_))
        ));
    }

    #[test]
    fn dry_run_decides_but_touches_nothing() {
        let mut fixture = Fixture::new(&["package a\nrelease 1\nfile a.txt\n"]);
        fixture.config.dry_run = true;
        let mut db = fixture.db();

        fixture.run(&mut db, "a", Action::Install).unwrap();
        db.reload().unwrap();

        assert!(!fixture.root_path("a.txt").exists());
        assert!(db.find("a").is_none());
    }

}
