// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pre/post-phase script hooks.
//!
//! A package may ship `<repo>/<pkg>/script`, a shell script invoked with a
//! single phase argument (`preinstall`, `postinstall`, `preupdate`,
//! `postupdate`, `preuninstall`, `postuninstall`) around each transaction
//! body. Scripts are advisory: every failure is logged and the transaction
//! proceeds.

use {
    crate::io,
    std::{
        path::Path,
        process::Command,
    },
};

/// Run a package's script for one phase, if the script exists.
///
/// With `root == "/"` the script runs in place under `/bin/sh`. For any
/// other root the script is copied to a temporary file under `<root>/tmp`
/// and run under `chroot <root>`, referring to its in-root path; the copy
/// is removed afterwards.
pub fn run_script(root: &Path, repo: &Path, package: &str, phase: &str) {
    let script = repo.join(package).join("script");
    if !script.is_file() {
        return;
    }

    if root == Path::new("/") {
        log::debug!("running {} {}", script.display(), phase);
        report(phase, Command::new("/bin/sh").arg(&script).arg(phase).status());
        return;
    }

    let copy = match io::copy_to_tmp(&root.join("tmp"), &script) {
        Ok(file) => file,
        Err(e) => {
            log::warn!("script {}: {}", phase, e);
            return;
        }
    };

    // The in-root view of the copied script.
    let inner = Path::new("/tmp").join(copy.path().file_name().expect("tempfile has a name"));

    log::debug!(
        "running {} under chroot {}",
        inner.display(),
        root.display()
    );
    report(
        phase,
        Command::new("/usr/sbin/chroot")
            .arg(root)
            .arg("/bin/sh")
            .arg(&inner)
            .arg(phase)
            .status(),
    );

    // `copy` is unlinked when it drops.
}

fn report(phase: &str, status: std::io::Result<std::process::ExitStatus>) {
    match status {
        Err(e) => log::warn!("script {}: spawn failed: {}", phase, e),
        Ok(status) if status.code() == Some(127) => {
            log::warn!("script {}: command interpreter not found", phase)
        }
        Ok(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_script_is_a_no_op() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::create_dir(repo.path().join("pkg")).unwrap();

        run_script(Path::new("/"), repo.path(), "pkg", "preinstall");
    }

    #[test]
    fn script_runs_with_phase_argument() {
        let repo = tempfile::tempdir().unwrap();
        let pkg_dir = repo.path().join("pkg");
        std::fs::create_dir(&pkg_dir).unwrap();

        let out = repo.path().join("out");
        std::fs::write(
            pkg_dir.join("script"),
            format!("#!/bin/sh\necho \"$1\" > {}\n", out.display()),
        )
        .unwrap();

        run_script(Path::new("/"), repo.path(), "pkg", "postinstall");

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "postinstall\n");
    }
}
