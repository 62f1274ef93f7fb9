// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Building and publishing a package repository.
//!
//! A repository is a directory of per-package subdirectories:
//!
//! ```text
//! <repo>/catalog
//! <repo>/<pkg>/data.a
//! <repo>/<pkg>/manifest
//! <repo>/<pkg>/script        (optional)
//! ```
//!
//! [create_package] builds one package directory from a manifest and a
//! staging tree; [publish] regenerates the catalog from every manifest in
//! the tree.

use {
    crate::{
        catalog::{Catalog, CatalogEntry},
        io,
        manifest::Manifest,
        MpkgError, Result,
    },
    ar_archive::ArchiveWriter,
    std::path::Path,
    walkdir::WalkDir,
};

/// Build a package directory in `repo_dir` from a manifest file and the
/// staging tree its node paths refer to.
///
/// Nodes are archived in manifest order, so directories must be listed
/// before their content. Returns the package name.
pub fn create_package(manifest_path: &Path, proto_dir: &Path, repo_dir: &Path) -> Result<String> {
    let manifest = Manifest::parse_file(manifest_path)?;

    let package_dir = repo_dir.join(&manifest.name);
    io::create_dirs(&package_dir)?;

    let archive_path = package_dir.join("data.a");
    let mut writer =
        ArchiveWriter::create(&archive_path).map_err(|e| MpkgError::archive(&archive_path, e))?;

    for node in &manifest.nodes {
        writer
            .append_path(&node.path, proto_dir)
            .map_err(|e| MpkgError::archive(&archive_path, e))?;
    }

    writer
        .finish()
        .map_err(|e| MpkgError::archive(&archive_path, e))?;

    manifest.emit_file(&package_dir.join("manifest"))?;

    if let Some(script) = &manifest.script {
        let source = manifest_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(script);

        io::copy_file(&source, &package_dir.join("script"))?;
    }

    log::info!("created {}-{}", manifest.name, manifest.release);

    Ok(manifest.name)
}

/// Walk a repository tree, collect every `manifest` into a catalog, and
/// write `<repo>/catalog`.
pub fn publish(repo_dir: &Path) -> Result<Catalog> {
    let mut catalog = Catalog::default();

    let walk = WalkDir::new(repo_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name().to_str() == Some("manifest"));

    for entry in walk {
        let manifest = Manifest::parse_file(entry.path())?;

        catalog.push(CatalogEntry {
            name: manifest.name.clone(),
            release: manifest.release,
            depends: manifest
                .depends
                .iter()
                .map(|depend| depend.name.clone())
                .collect(),
        })?;
    }

    catalog.emit_file(repo_dir)?;

    log::info!(
        "published {} ({} packages)",
        repo_dir.join("catalog").display(),
        catalog.len()
    );

    Ok(catalog)
}
