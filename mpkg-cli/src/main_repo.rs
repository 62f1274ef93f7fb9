// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    anyhow::Result,
    clap::{Arg, Command},
    std::path::Path,
};

fn main() -> Result<()> {
    let matches = Command::new("mpkg-repo")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Publish a repository catalog from its package manifests")
        .arg(
            Arg::new("repodir")
                .multiple_values(true)
                .required(true)
                .help("Repository directories to index"),
        )
        .get_matches();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    for repodir in matches.values_of("repodir").expect("repodir is required") {
        mpkg_packaging::repository::publish(Path::new(repodir))?;
    }

    Ok(())
}
