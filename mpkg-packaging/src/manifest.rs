// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Package manifests.
//!
//! A manifest is a line-oriented text file. Blank lines and lines whose
//! first non-whitespace byte is `#` are comments. Every other line is a
//! directive followed by exactly one argument, separated by the
//! whitespace set of [crate::io::split_fields]:
//!
//! ```text
//! package hello
//! release 2
//! depend libgreet
//! dir usr
//! dir usr/bin
//! file usr/bin/hello
//! config etc/hello.conf
//! ```
//!
//! `package` and `release` must each appear exactly once. Node order is
//! preserved; directories must precede their content for extraction to
//! create them first.

use {
    crate::{io, MpkgError, Result},
    std::{
        io::Write,
        path::Path,
    },
};

/// The kind of a manifest content node.
///
/// `Config` is treated as `File` on install and on uninstall.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeKind {
    Config,
    Dir,
    File,
}

impl NodeKind {
    fn directive(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Dir => "dir",
            Self::File => "file",
        }
    }
}

/// One content node: a path relative to the root plus its kind.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManifestNode {
    pub path: String,
    pub kind: NodeKind,
}

/// A dependency on another package, by name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Dependency {
    pub name: String,
}

/// A parsed package manifest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Manifest {
    pub name: String,
    pub release: u32,
    pub depends: Vec<Dependency>,
    pub nodes: Vec<ManifestNode>,
    /// Optional pre/post-phase script, relative to the manifest file.
    pub script: Option<String>,
}

impl Manifest {
    /// Parse a manifest file.
    pub fn parse_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| MpkgError::path_io("open", path, e))?;

        Self::parse_str(&path.display().to_string(), &text)
    }

    /// Parse manifest text. `path` is used for error context only.
    pub fn parse_str(path: &str, text: &str) -> Result<Self> {
        let error = |line: usize, message: String| MpkgError::ManifestParse {
            path: path.to_string(),
            line,
            message,
        };

        let mut name = None;
        let mut release = None;
        let mut script = None;
        let mut depends = Vec::new();
        let mut nodes = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let lineno = index + 1;
            let tokens = io::split_fields(line).collect::<Vec<_>>();

            match tokens.first() {
                None => continue,
                Some(first) if first.starts_with('#') => continue,
                _ => {}
            }

            if tokens.len() < 2 {
                return Err(error(lineno, "not enough arguments".to_string()));
            }
            if tokens.len() > 2 {
                return Err(error(lineno, "too many arguments".to_string()));
            }

            let (directive, argument) = (tokens[0], tokens[1]);

            match directive {
                "package" => {
                    if name.replace(argument.to_string()).is_some() {
                        return Err(error(lineno, "duplicate 'package' directive".to_string()));
                    }
                }
                "release" => {
                    let value = argument.parse::<u32>().map_err(|_| {
                        error(lineno, format!("{}: invalid release number", argument))
                    })?;
                    if release.replace(value).is_some() {
                        return Err(error(lineno, "duplicate 'release' directive".to_string()));
                    }
                }
                "depend" => {
                    depends.push(Dependency {
                        name: argument.to_string(),
                    });
                }
                "file" => {
                    nodes.push(ManifestNode {
                        path: argument.to_string(),
                        kind: NodeKind::File,
                    });
                }
                "config" => {
                    nodes.push(ManifestNode {
                        path: argument.to_string(),
                        kind: NodeKind::Config,
                    });
                }
                "dir" => {
                    nodes.push(ManifestNode {
                        path: argument.to_string(),
                        kind: NodeKind::Dir,
                    });
                }
                "script" => {
                    if script.replace(argument.to_string()).is_some() {
                        return Err(error(lineno, "duplicate 'script' directive".to_string()));
                    }
                }
                unknown => {
                    return Err(error(lineno, format!("{}: unknown directive", unknown)));
                }
            }
        }

        let name =
            name.ok_or_else(|| error(0, "missing 'package' directive".to_string()))?;
        let release =
            release.ok_or_else(|| error(0, "missing 'release' directive".to_string()))?;

        Ok(Self {
            name,
            release,
            depends,
            nodes,
            script,
        })
    }

    /// Write the manifest in its canonical text form.
    pub fn emit(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writeln!(writer, "#")?;
        writeln!(writer, "# Created by mpkg-create")?;
        writeln!(writer, "# /!\\ DO NOT EDIT!!! /!\\")?;
        writeln!(writer, "#")?;
        writeln!(writer, "package {}", self.name)?;
        writeln!(writer, "release {}", self.release)?;
        if let Some(script) = &self.script {
            writeln!(writer, "script {}", script)?;
        }
        writeln!(writer)?;

        for depend in &self.depends {
            writeln!(writer, "depend {}", depend.name)?;
        }
        writeln!(writer)?;

        for node in &self.nodes {
            writeln!(writer, "{} {}", node.kind.directive(), node.path)?;
        }

        Ok(())
    }

    /// Emit the manifest to a file.
    pub fn emit_file(&self, path: &Path) -> Result<()> {
        let mut file =
            std::fs::File::create(path).map_err(|e| MpkgError::path_io("open", path, e))?;

        self.emit(&mut file)
            .map_err(|e| MpkgError::path_io("write", path, e))
    }
}
