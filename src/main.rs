// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pybrew::{
    BrewConfig, BuildOptions, InstallStatus, InstallationPipeline, InstallationRequest,
    ProgressStyle, known_versions,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, warn};

#[derive(Parser)]
#[command(name = "pybrew")]
#[command(author, version, about = "Build and install Python versions from source", long_about = None)]
struct Cli {
    /// Root directory (default: $PYBREW_ROOT or ~/.pybrew)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Hide download progress
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download, build and install a Python version
    Install {
        /// Version (2.7.2, Python-2.7.2) or source archive URL
        locator: String,

        /// Reinstall over an existing installation and skip `make test`
        #[arg(short, long)]
        force: bool,

        /// Extra options passed to ./configure
        #[arg(short = 'C', long = "configure", default_value = "", allow_hyphen_values = true)]
        configure: String,

        /// Skip installing distribute and pip
        #[arg(short = 'n', long = "no-setuptools")]
        no_setuptools: bool,
    },
    /// List versions that can be installed by number
    Known,
}

fn main() -> ExitCode {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            let code = e
                .downcast_ref::<pybrew::Error>()
                .map(pybrew::Error::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Install {
            locator,
            force,
            configure,
            no_setuptools,
        } => {
            let config = BrewConfig::load(cli.root).context("Failed to load configuration")?;
            let progress = if cli.quiet {
                ProgressStyle::Silent
            } else if std::io::stderr().is_terminal() {
                ProgressStyle::Bar
            } else {
                ProgressStyle::Log
            };

            let pipeline = InstallationPipeline::new(config)?.with_progress(progress);
            let request = InstallationRequest::new(
                locator,
                BuildOptions {
                    configure_flags: configure,
                    force,
                    skip_packaging_bootstrap: no_setuptools,
                },
            );
            let outcome = pipeline.run(request)?;

            if outcome.status == InstallStatus::Installed
                && let Some(warning) = outcome.bootstrap.warning()
            {
                warn!("{} installed without packaging tools: {}", outcome.package, warning);
            }
            Ok(())
        }
        Commands::Known => {
            println!("# Known Python versions");
            for version in known_versions() {
                println!("Python-{}", version);
            }
            Ok(())
        }
    }
}
