// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    anyhow::Result,
    clap::{Arg, Command},
    std::path::{Path, PathBuf},
};

fn main() -> Result<()> {
    let matches = Command::new("mpkg-create")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Build package archives from a staging tree")
        .arg(
            Arg::new("protodir")
                .short('p')
                .takes_value(true)
                .required(true)
                .help("Staging tree holding the packages' content"),
        )
        .arg(
            Arg::new("repodir")
                .short('r')
                .takes_value(true)
                .required(true)
                .help("Repository directory to populate"),
        )
        .arg(
            Arg::new("manifest")
                .multiple_values(true)
                .required(true)
                .help("Package manifests to build"),
        )
        .get_matches();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let proto = PathBuf::from(matches.value_of("protodir").expect("protodir is required"));
    let repo = PathBuf::from(matches.value_of("repodir").expect("repodir is required"));

    for manifest in matches.values_of("manifest").expect("manifest is required") {
        mpkg_packaging::repository::create_package(Path::new(manifest), &proto, &repo)?;
    }

    Ok(())
}
