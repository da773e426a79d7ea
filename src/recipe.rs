//! The packaging pipeline.
//!
//! Each lifecycle stage is its own subcommand (`source`, `build`,
//! `package`); `install` runs the whole pipeline in order. Every stage
//! prints progress to stderr; the only stdout output is the final package
//! manifest JSON, so callers can parse it to get paths and library names
//! instead of hardcoding them.

use anyhow::{bail, Context, Result};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use crate::autotools::Autotools;
use crate::config::{BuildConfig, BuildOptions, HostProfile};
use crate::package;
use crate::patch;
use crate::preflight;
use crate::source::{self, defaults, SOURCE_DIR};
use crate::timing::Timer;

/// Directory layout of one packaging run, rooted at the work directory.
///
/// ```text
/// <work_dir>/
///   downloads/   fetched release archive
///   source/      extracted source tree (version-independent name)
///   package/     staged output: licenses/, include/, lib/
/// ```
pub struct RecipeContext {
    work_dir: PathBuf,
}

impl RecipeContext {
    /// Root the layout at `work_dir`, made absolute up front.
    ///
    /// Configure runs with the source tree as its working directory, so any
    /// relative path handed to it (the script itself, the install prefix)
    /// would resolve against the wrong base.
    pub fn new(work_dir: &Path) -> Result<Self> {
        let absolute = if work_dir.is_absolute() {
            work_dir.to_path_buf()
        } else {
            std::env::current_dir()
                .context("Failed to resolve the current directory")?
                .join(work_dir)
        };
        let work_dir = absolute
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
        Ok(Self { work_dir })
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.work_dir.join("downloads")
    }

    pub fn archive_path(&self) -> PathBuf {
        self.downloads_dir().join(defaults::archive_name())
    }

    pub fn source_dir(&self) -> PathBuf {
        self.work_dir.join(SOURCE_DIR)
    }

    pub fn package_dir(&self) -> PathBuf {
        self.work_dir.join("package")
    }
}

/// Resolve and validate the effective configuration.
///
/// Pure: rejects unusable configurations before any filesystem or network
/// activity happens.
pub fn resolve_config(options: BuildOptions) -> Result<BuildConfig> {
    let host = HostProfile::from_env();
    Ok(BuildConfig::resolve(options, host)?)
}

/// Full pipeline: declare dependencies, validate, fetch, build, stage,
/// and print the package manifest.
pub fn cmd_install(work_dir: &Path, options: BuildOptions) -> Result<()> {
    eprintln!("=== {} {} ===\n", defaults::NAME, defaults::VERSION);
    let start = Instant::now();

    // 1. Dependency declaration
    let build_requires = preflight::build_requirements();
    match build_requires.as_slice() {
        [] => eprintln!("[SKIP] m4 already on the host, no build requirements declared"),
        reqs => {
            for req in reqs {
                eprintln!("Declared build requirement: {}", req);
            }
        }
    }

    // 2. Configuration validation, before any I/O
    let config = resolve_config(options)?;
    config.print();

    let ctx = RecipeContext::new(work_dir)?;
    preflight::ensure_build_tools(&config)?;

    // 3. Source acquisition
    eprintln!("\n=== Source ===");
    let t = Timer::start("Source");
    let source_dir = source::prepare_source(ctx.work_dir(), &ctx.downloads_dir())?;
    t.finish();

    // 4. Build
    eprintln!("\n=== Build ===");
    patch::apply_patches(&config.host, &source_dir)?;
    let autotools = Autotools::new(&config, &source_dir, &ctx.package_dir());
    autotools.build(config.options.run_checks)?;

    // 5-6. Package staging and metadata export
    eprintln!("\n=== Package ===");
    let t = Timer::start("Package");
    let manifest = package::stage(&autotools, &source_dir, &ctx.package_dir(), build_requires)?;
    t.finish();

    let total = start.elapsed().as_secs_f64();
    if total >= 60.0 {
        eprintln!("\n=== Install Complete ({:.1}m) ===", total / 60.0);
    } else {
        eprintln!("\n=== Install Complete ({:.1}s) ===", total);
    }
    eprintln!("  Package: {}", ctx.package_dir().display());
    eprintln!("  Libs:    {}", manifest.libs.join(", "));

    manifest.print()
}

/// The `source` subcommand: fetch, verify, extract, rename.
pub fn cmd_source(work_dir: &Path, options: BuildOptions) -> Result<()> {
    // Validation rejects unusable configurations before anything is fetched.
    let _config = resolve_config(options)?;

    let ctx = RecipeContext::new(work_dir)?;
    let t = Timer::start("Source");
    let source_dir = source::prepare_source(ctx.work_dir(), &ctx.downloads_dir())?;
    t.finish();

    eprintln!("  Source tree: {}", source_dir.display());
    Ok(())
}

/// The `build` subcommand: configure, make, optionally `make check`.
///
/// Requires a prepared source tree.
pub fn cmd_build(work_dir: &Path, options: BuildOptions) -> Result<()> {
    let config = resolve_config(options)?;

    let ctx = RecipeContext::new(work_dir)?;
    let source_dir = ctx.source_dir();
    if !source_dir.join("configure").is_file() {
        bail!(
            "No source tree at {}.\nRun `gmpack source` first.",
            source_dir.display()
        );
    }

    preflight::ensure_build_tools(&config)?;

    patch::apply_patches(&config.host, &source_dir)?;
    let autotools = Autotools::new(&config, &source_dir, &ctx.package_dir());
    autotools.build(config.options.run_checks)?;

    eprintln!("\n=== Build Complete ===");
    eprintln!("  Next: gmpack package");
    Ok(())
}

/// The `package` subcommand: stage licenses and artifacts from a completed
/// build, prune what must not ship, print the manifest.
pub fn cmd_package(work_dir: &Path, options: BuildOptions) -> Result<()> {
    let config = resolve_config(options)?;

    let ctx = RecipeContext::new(work_dir)?;
    let source_dir = ctx.source_dir();
    if !source_dir.join("configure").is_file() {
        bail!(
            "No source tree at {}.\nRun `gmpack source` first.",
            source_dir.display()
        );
    }
    // A build must have produced a Makefile before install can run.
    if !source_dir.join("Makefile").is_file() {
        bail!(
            "No build output under {}.\nRun `gmpack build` first.",
            source_dir.display()
        );
    }

    let build_requires = preflight::build_requirements();
    let autotools = Autotools::new(&config, &source_dir, &ctx.package_dir());

    let t = Timer::start("Package");
    let manifest = package::stage(&autotools, &source_dir, &ctx.package_dir(), build_requires)?;
    t.finish();

    manifest.print()
}

// =============================================================================
// Tests
// =============================================================================
