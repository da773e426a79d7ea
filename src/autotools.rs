//! Driving the upstream configure/make toolchain.
//!
//! One `Autotools` context is constructed per lifecycle run and handed to
//! the build and packaging stages; configure arguments and compiler flags
//! are derived from the frozen configuration exactly once.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::thread;

use crate::config::{BuildConfig, BuildOptions, BuildType};
use crate::process::Cmd;
use crate::timing::Timer;

pub struct Autotools {
    source_dir: PathBuf,
    configure_args: Vec<String>,
    compiler_flags: Vec<String>,
    jobs: usize,
}

impl Autotools {
    /// Derive the invocation context from the resolved configuration.
    pub fn new(config: &BuildConfig, source_dir: &Path, package_dir: &Path) -> Self {
        let mut args = configure_args(&config.options);
        args.push(format!("--prefix={}", package_dir.display()));

        Self {
            source_dir: source_dir.to_path_buf(),
            configure_args: args,
            compiler_flags: compiler_flags(config),
            jobs: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        }
    }

    /// Run `./configure` with the derived flags.
    ///
    /// Compiler flags go through CFLAGS/CXXFLAGS on this invocation only;
    /// the generated Makefiles carry them from here on.
    pub fn configure(&self) -> Result<()> {
        let script = self.source_dir.join("configure");
        if !script.is_file() {
            bail!(
                "No configure script at {}.\nRun `gmpack source` first.",
                script.display()
            );
        }

        eprintln!("  Configuring: {}", self.configure_args.join(" "));

        let flags = self.compiler_flags.join(" ");
        let mut cmd = Cmd::new(script.to_string_lossy())
            .dir(&self.source_dir)
            .error_msg("configure failed");
        for arg in &self.configure_args {
            cmd = cmd.arg(arg);
        }
        if !flags.is_empty() {
            cmd = cmd.env("CFLAGS", &flags).env("CXXFLAGS", &flags);
        }
        cmd.run_streamed()?;
        Ok(())
    }

    /// Compile with the host's parallelism.
    pub fn make(&self) -> Result<()> {
        eprintln!("  Building (make -j{})", self.jobs);
        Cmd::new("make")
            .arg(format!("-j{}", self.jobs))
            .dir(&self.source_dir)
            .error_msg("make failed")
            .run_streamed()?;
        Ok(())
    }

    /// Run the upstream test suite.
    pub fn check(&self) -> Result<()> {
        eprintln!("  Running upstream checks (make check)");
        Cmd::new("make")
            .arg(format!("-j{}", self.jobs))
            .arg("check")
            .dir(&self.source_dir)
            .error_msg("make check failed")
            .run_streamed()?;
        Ok(())
    }

    /// Install into the prefix fixed at configure time.
    pub fn install(&self) -> Result<()> {
        eprintln!("  Installing (make install)");
        Cmd::new("make")
            .arg("install")
            .dir(&self.source_dir)
            .error_msg("make install failed")
            .run_streamed()?;
        Ok(())
    }

    /// Configure, build, and optionally run checks, in order.
    ///
    /// A check failure is as fatal as a build failure; the flag only exists
    /// because the suite's runtime is impractical in some CI environments.
    pub fn build(&self, run_checks: bool) -> Result<()> {
        let t = Timer::start("configure");
        self.configure()?;
        t.finish();

        let t = Timer::start("make");
        self.make()?;
        t.finish();

        if run_checks {
            let t = Timer::start("make check");
            self.check()?;
            t.finish();
        }

        Ok(())
    }
}

/// Configure flags derived from the options.
///
/// The shared/static pairs are mutually exclusive: exactly one pair is
/// always passed, so the upstream default can never leak through.
pub fn configure_args(options: &BuildOptions) -> Vec<String> {
    let mut args = Vec::new();

    if options.disable_assembly {
        args.push("--disable-assembly".to_string());
    }
    if options.shared {
        args.push("--enable-shared".to_string());
        args.push("--disable-static".to_string());
    } else {
        args.push("--disable-shared".to_string());
        args.push("--enable-static".to_string());
    }
    if options.enable_cxx {
        args.push("--enable-cxx".to_string());
    }

    args
}

/// Compiler flags injected through the configure environment.
pub fn compiler_flags(config: &BuildConfig) -> Vec<String> {
    let mut flags = Vec::new();

    if config.options.fpic {
        flags.push("-fPIC".to_string());
    }
    flags.push(match config.host.build_type {
        BuildType::Release => "-O3".to_string(),
        BuildType::Debug => "-g".to_string(),
    });

    flags
}

// =============================================================================
// Tests
// =============================================================================
