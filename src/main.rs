//! gmpack - builds and packages GMP from its pinned upstream release.
//!
//! Drives the full packaging lifecycle for GMP 6.1.2: fetch and verify
//! the release archive, configure and compile with option-derived flags,
//! stage the package layout, and report the libraries it provides as JSON
//! on stdout. Progress output goes to stderr.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use gmpack::clean;
use gmpack::config::BuildOptions;
use gmpack::preflight;
use gmpack::recipe;
use gmpack::source::defaults;

#[derive(Parser)]
#[command(name = "gmpack")]
#[command(about = "Builds and packages the GMP arbitrary-precision arithmetic library")]
#[command(
    after_help = "QUICK START:\n  gmpack preflight    Check host tools\n  gmpack install      Fetch, build and package in one go\n  gmpack show config  Show the effective configuration\n  gmpack clean        Remove build state"
)]
struct Cli {
    /// Work directory for downloads, source tree and package output
    #[arg(long, global = true, default_value = ".")]
    work_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Build options shared by every stage that resolves a configuration.
#[derive(Args)]
struct BuildFlags {
    /// Build shared libraries instead of static
    #[arg(long)]
    shared: bool,

    /// Run the upstream test suite after compiling (slow)
    #[arg(long)]
    run_checks: bool,

    /// Keep the hand-tuned assembly backends enabled
    #[arg(long)]
    with_assembly: bool,

    /// Skip the C++ binding (libgmpxx)
    #[arg(long)]
    no_cxx: bool,

    /// Compile without position-independent code
    #[arg(long)]
    no_pic: bool,
}

impl BuildFlags {
    fn into_options(self) -> BuildOptions {
        BuildOptions {
            shared: self.shared,
            fpic: !self.no_pic,
            disable_assembly: !self.with_assembly,
            run_checks: self.run_checks,
            enable_cxx: !self.no_cxx,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and print the package manifest
    Install {
        #[command(flatten)]
        flags: BuildFlags,
    },

    /// Fetch, verify and extract the release archive
    Source {
        #[command(flatten)]
        flags: BuildFlags,
    },

    /// Configure and compile (requires a prepared source tree)
    Build {
        #[command(flatten)]
        flags: BuildFlags,
    },

    /// Stage the package from a completed build and print the manifest
    Package {
        #[command(flatten)]
        flags: BuildFlags,
    },

    /// Run preflight checks (verify host tools before building)
    Preflight {
        #[command(flatten)]
        flags: BuildFlags,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },

    /// Clean build state (default: preserves downloads)
    Clean {
        /// Remove downloaded archives instead
        #[arg(long, conflicts_with = "all")]
        downloads: bool,

        /// Remove everything, downloads included
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show the effective build configuration
    Config {
        #[command(flatten)]
        flags: BuildFlags,
    },
    /// Show the pinned source release
    Source,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Install { flags } => {
            recipe::cmd_install(&cli.work_dir, flags.into_options())?;
        }

        Commands::Source { flags } => {
            recipe::cmd_source(&cli.work_dir, flags.into_options())?;
        }

        Commands::Build { flags } => {
            recipe::cmd_build(&cli.work_dir, flags.into_options())?;
        }

        Commands::Package { flags } => {
            recipe::cmd_package(&cli.work_dir, flags.into_options())?;
        }

        Commands::Preflight { flags } => {
            let config = recipe::resolve_config(flags.into_options())?;
            preflight::cmd_preflight(&config)?;
        }

        Commands::Show { what } => match what {
            ShowTarget::Config { flags } => {
                let config = recipe::resolve_config(flags.into_options())?;
                config.print();
            }
            ShowTarget::Source => show_source(),
        },

        Commands::Clean { downloads, all } => {
            let target = if all {
                clean::CleanTarget::All
            } else if downloads {
                clean::CleanTarget::Downloads
            } else {
                clean::CleanTarget::Outputs
            };
            clean::cmd_clean(&cli.work_dir, target)?;
        }
    }

    Ok(())
}

/// Print the pinned source release coordinates.
fn show_source() {
    eprintln!("=== Source Release ===");
    eprintln!("  name:     {}", defaults::NAME);
    eprintln!("  version:  {}", defaults::VERSION);
    eprintln!("  url:      {}", defaults::download_url());
    eprintln!("  sha256:   {}", defaults::SHA256);
}
