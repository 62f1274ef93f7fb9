// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! mpkg packaging primitives.

This crate defines the package model and transaction engine of mpkg, a
minimal source-based package manager. Package payloads are `ar`-style
archives handled by the `ar-archive` crate; everything package-shaped lives
here.

# A Tour of Functionality

A package is described by a *manifest*, a line-oriented text file naming the
package, its release number, its dependencies, and its content nodes
(files, config files, directories). [manifest::Manifest] parses and emits
manifests.

A repository is a directory of per-package subdirectories, each holding a
`data.a` payload archive and a `manifest`, indexed by a top-level `catalog`
file mapping each package to its release and dependency names.
[catalog::Catalog] parses and emits catalogs; [repository] builds package
directories from a staging tree ([repository::create_package]) and
publishes the catalog ([repository::publish]).

The target root's record of installed packages lives under
`<root>/var/db/mpkg`, one subdirectory per package holding the installed
manifest and an optional `automatic` marker. [db::InstalledDb] loads and
mutates these records. [lock::TransactionLock] provides the per-root
transaction lock.

[worker::Worker] is the per-transaction state machine: it resolves
dependencies through the catalog (installing missing ones as automatic),
decides between install / update / uninstall / no-op, brackets each action
with script phases ([scripts::run_script]), and refuses to uninstall a
package that another installed package depends on.

[io] defines small filesystem helpers shared by the rest of the crate.
*/

pub mod catalog;
pub mod db;
pub mod error;
pub mod io;
pub mod lock;
pub mod manifest;
pub mod repository;
pub mod scripts;
pub mod worker;

pub use error::{MpkgError, Result};

use std::path::PathBuf;

/// Global configuration for one transaction, populated by the CLI.
#[derive(Clone, Debug)]
pub struct Config {
    /// Target root filesystem prefix.
    pub root: PathBuf,

    /// Source repository tree.
    pub repo: PathBuf,

    /// Decide actions but perform nothing.
    pub dry_run: bool,
}
