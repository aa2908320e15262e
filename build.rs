// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: root directory
fn root_arg() -> Arg {
    Arg::new("root")
        .long("root")
        .value_name("DIR")
        .global(true)
        .help("Root directory (default: $PYBREW_ROOT or ~/.pybrew)")
}

fn build_cli() -> Command {
    Command::new("pybrew")
        .version(env!("CARGO_PKG_VERSION"))
        .author("pybrew Contributors")
        .about("Build and install Python versions from source")
        .arg(root_arg())
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Hide download progress"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("install")
                .about("Download, build and install a Python version")
                .arg(
                    Arg::new("locator")
                        .required(true)
                        .help("Version (2.7.2, Python-2.7.2) or source archive URL"),
                )
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Reinstall over an existing installation and skip `make test`"),
                )
                .arg(
                    Arg::new("configure")
                        .short('C')
                        .long("configure")
                        .value_name("FLAGS")
                        .default_value("")
                        .allow_hyphen_values(true)
                        .help("Extra options passed to ./configure"),
                )
                .arg(
                    Arg::new("no_setuptools")
                        .short('n')
                        .long("no-setuptools")
                        .action(ArgAction::SetTrue)
                        .help("Skip installing distribute and pip"),
                ),
        )
        .subcommand(Command::new("known").about("List versions that can be installed by number"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("pybrew.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
