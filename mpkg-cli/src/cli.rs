// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    anyhow::Result,
    clap::{Arg, ArgMatches, Command},
    mpkg_packaging::{
        catalog::Catalog,
        db::InstalledDb,
        lock::TransactionLock,
        worker::{Action, Worker},
        Config,
    },
    std::path::PathBuf,
};

const ABOUT: &str = "\
mpkg installs, updates, and removes packages built from a source
repository onto a target root filesystem.

A repository is a directory of per-package subdirectories, each holding
a `data.a` payload archive and a `manifest`, indexed by a top-level
`catalog`. Build repositories with mpkg-create and mpkg-repo.

Installed packages are recorded under <root>/var/db/mpkg. Packages
pulled in to satisfy a dependency are marked automatic; `mpkg list -a`
shows them.
";

pub fn run() -> Result<()> {
    let app = Command::new("mpkg")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Minimal source-based package manager")
        .long_about(ABOUT)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("root")
                .short('R')
                .takes_value(true)
                .default_value("/")
                .global(true)
                .help("Target root filesystem"),
        )
        .arg(
            Arg::new("repo")
                .short('r')
                .takes_value(true)
                .default_value("/var/mpkg")
                .global(true)
                .help("Package repository directory"),
        )
        .arg(
            Arg::new("dry-run")
                .short('n')
                .global(true)
                .help("Decide actions but perform nothing"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .global(true)
                .help("Verbose output"),
        )
        .arg(
            Arg::new("yes")
                .short('y')
                .global(true)
                .help("Assume yes where a question would be asked"),
        )
        .subcommand(
            Command::new("info")
                .about("Show information about installed packages")
                .arg(
                    Arg::new("all")
                        .short('a')
                        .conflicts_with("package")
                        .help("Describe every installed package"),
                )
                .arg(Arg::new("deps").short('d').help("Show dependencies"))
                .arg(Arg::new("files").short('l').help("Show content nodes"))
                .arg(
                    Arg::new("package")
                        .multiple_values(true)
                        .required_unless_present("all")
                        .help("Packages to describe"),
                ),
        )
        .subcommand(
            Command::new("install").about("Install packages").arg(
                Arg::new("package")
                    .multiple_values(true)
                    .required(true)
                    .help("Packages to install"),
            ),
        )
        .subcommand(
            Command::new("list")
                .about("List installed packages")
                .arg(
                    Arg::new("automatic")
                        .short('a')
                        .conflicts_with("manual")
                        .help("Only packages installed as dependencies"),
                )
                .arg(
                    Arg::new("manual")
                        .short('m')
                        .help("Only explicitly installed packages"),
                ),
        )
        .subcommand(
            Command::new("remove").about("Remove installed packages").arg(
                Arg::new("package")
                    .multiple_values(true)
                    .required(true)
                    .help("Packages to remove"),
            ),
        )
        .subcommand(
            Command::new("update")
                .about("Update installed packages")
                .arg(
                    Arg::new("package")
                        .multiple_values(true)
                        .help("Packages to update (default: everything installed)"),
                ),
        );

    let matches = app.get_matches();

    let level = if matches.is_present("verbose") {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let config = Config {
        root: PathBuf::from(matches.value_of("root").expect("root has a default")),
        repo: PathBuf::from(matches.value_of("repo").expect("repo has a default")),
        dry_run: matches.is_present("dry-run"),
    };

    match matches.subcommand() {
        Some(("info", args)) => command_info(&config, args),
        Some(("install", args)) => command_install(&config, args),
        Some(("list", args)) => command_list(&config, args),
        Some(("remove", args)) => command_remove(&config, args),
        Some(("update", args)) => command_update(&config, args),
        _ => unreachable!("a subcommand is required"),
    }
}

fn command_info(config: &Config, args: &ArgMatches) -> Result<()> {
    let db = InstalledDb::open(&config.root)?;

    let filter = if args.is_present("all") {
        None
    } else {
        Some(
            args.values_of("package")
                .expect("package list is required without -a")
                .collect::<Vec<_>>(),
        )
    };

    for record in db.records() {
        if let Some(names) = &filter {
            if !names.contains(&record.manifest.name.as_str()) {
                continue;
            }
        }

        println!("{}-{}", record.manifest.name, record.manifest.release);

        if args.is_present("deps") {
            println!("depends:");
            for depend in &record.manifest.depends {
                println!("\t{}", depend.name);
            }
        }

        if args.is_present("files") {
            println!("content:");
            for node in &record.manifest.nodes {
                println!("\t{}", node.path);
            }
        }
    }

    Ok(())
}

fn command_list(config: &Config, args: &ArgMatches) -> Result<()> {
    let db = InstalledDb::open(&config.root)?;

    let (mut automatic, mut manual) = (args.is_present("automatic"), args.is_present("manual"));
    if !automatic && !manual {
        automatic = true;
        manual = true;
    }

    for record in db.records() {
        if (automatic && record.automatic) || (manual && !record.automatic) {
            println!("{}-{}", record.manifest.name, record.manifest.release);
        }
    }

    Ok(())
}

fn command_install(config: &Config, args: &ArgMatches) -> Result<()> {
    let catalog = Catalog::parse_file(&config.repo)?;
    let mut db = InstalledDb::open(&config.root)?;
    let _lock = TransactionLock::acquire(db.path())?;

    for package in args.values_of("package").expect("package list is required") {
        Worker::new(config, &catalog, &mut db, package, Action::Install, false).execute()?;
        db.reload()?;
    }

    Ok(())
}

fn command_remove(config: &Config, args: &ArgMatches) -> Result<()> {
    // Uninstalls never consult the catalog, so a repository is not needed
    // to remove packages.
    let catalog = Catalog::default();
    let mut db = InstalledDb::open(&config.root)?;
    let _lock = TransactionLock::acquire(db.path())?;

    for package in args.values_of("package").expect("package list is required") {
        Worker::new(config, &catalog, &mut db, package, Action::Uninstall, false).execute()?;
        db.reload()?;
    }

    Ok(())
}

fn command_update(config: &Config, args: &ArgMatches) -> Result<()> {
    let catalog = Catalog::parse_file(&config.repo)?;
    let mut db = InstalledDb::open(&config.root)?;
    let _lock = TransactionLock::acquire(db.path())?;

    let packages = match args.values_of("package") {
        Some(values) => values.map(String::from).collect::<Vec<_>>(),
        None => db
            .records()
            .iter()
            .map(|record| record.manifest.name.clone())
            .collect(),
    };

    for package in packages {
        Worker::new(config, &catalog, &mut db, &package, Action::Update, false).execute()?;
        db.reload()?;
    }

    Ok(())
}
