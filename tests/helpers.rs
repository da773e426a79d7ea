//! Shared test utilities for gmpack tests.
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test environment with a temporary work directory.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Work directory for downloads, source tree and package output
    pub work_dir: PathBuf,
}

impl TestEnv {
    /// Create a new test environment with an empty work directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let work_dir = temp_dir.path().join("work");
        fs::create_dir_all(&work_dir).expect("Failed to create work dir");

        Self {
            _temp_dir: temp_dir,
            work_dir,
        }
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.work_dir.join("downloads")
    }

    pub fn source_dir(&self) -> PathBuf {
        self.work_dir.join("source")
    }

    pub fn package_dir(&self) -> PathBuf {
        self.work_dir.join("package")
    }
}

/// Create a fake source tree whose configure/make cycle runs with only
/// `sh` and `make` on the host.
///
/// The configure stub records its arguments and environment, then
/// instantiates `Makefile` from `Makefile.in` the way the real script
/// does. The makefile compiles nothing: it stamps the build, refuses to
/// `check` before a build happened, and installs a gmp-shaped layout
/// (header, static libraries, libtool archive, docs) under the prefix
/// configure recorded.
pub fn create_fake_source_tree(source_dir: &Path) {
    fs::create_dir_all(source_dir).expect("Failed to create source dir");

    // The comment mirrors the linker-flag line the macOS patch rewrites.
    let configure = r#"#!/bin/sh
# linker flags template: -install_name \$rpath/libgmp.dylib
echo "$@" > configure-args.txt
echo "CFLAGS=$CFLAGS" > configure-env.txt
echo "CXXFLAGS=$CXXFLAGS" >> configure-env.txt
prefix=
for arg in "$@"; do
  case "$arg" in
    --prefix=*) prefix="${arg#--prefix=}" ;;
  esac
done
if [ -z "$prefix" ]; then
  echo "configure: no --prefix given" >&2
  exit 1
fi
printf '%s' "$prefix" > prefix.txt
cp Makefile.in Makefile
echo "configure: creating Makefile"
"#;
    write_executable(&source_dir.join("configure"), configure);

    let makefile = concat!(
        "PREFIX = $(shell cat prefix.txt)\n",
        "\n",
        "all:\n",
        "\techo built > build-stamp.txt\n",
        "\n",
        "check:\n",
        "\ttest -f build-stamp.txt\n",
        "\techo checked >> check-runs.txt\n",
        "\n",
        "install:\n",
        "\tmkdir -p $(PREFIX)/include $(PREFIX)/lib $(PREFIX)/share/doc\n",
        "\tcp gmp.h $(PREFIX)/include/gmp.h\n",
        "\tcp libgmp.a.in $(PREFIX)/lib/libgmp.a\n",
        "\tcp libgmpxx.a.in $(PREFIX)/lib/libgmpxx.a\n",
        "\techo \"# libtool archive\" > $(PREFIX)/lib/libgmp.la\n",
        "\techo manual > $(PREFIX)/share/doc/gmp.txt\n",
    );
    fs::write(source_dir.join("Makefile.in"), makefile).expect("Failed to write Makefile.in");

    fs::write(source_dir.join("gmp.h"), "#define __GNU_MP__ 6\n").expect("Failed to write header");
    fs::write(source_dir.join("libgmp.a.in"), "!<arch>\n").expect("Failed to write library");
    fs::write(source_dir.join("libgmpxx.a.in"), "!<arch>\n").expect("Failed to write library");
    fs::write(
        source_dir.join("COPYINGv2"),
        "GNU GENERAL PUBLIC LICENSE Version 2\n",
    )
    .expect("Failed to write license");
    fs::write(
        source_dir.join("COPYING.LESSERv3"),
        "GNU LESSER GENERAL PUBLIC LICENSE Version 3\n",
    )
    .expect("Failed to write license");
}

/// Write a file and mark it executable.
pub fn write_executable(path: &Path, content: &str) {
    fs::write(path, content).expect("Failed to write script");
    let mut perms = fs::metadata(path)
        .expect("Failed to get metadata")
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("Failed to set permissions");
}

/// Number of times the fake `make check` target ran.
pub fn check_run_count(source_dir: &Path) -> usize {
    match fs::read_to_string(source_dir.join("check-runs.txt")) {
        Ok(content) => content.lines().count(),
        Err(_) => 0,
    }
}

/// Sorted paths under a directory, relative to it.
pub fn dir_snapshot(dir: &Path) -> Vec<String> {
    let mut entries: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.depth() > 0)
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .expect("entry under snapshot root")
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    entries.sort();
    entries
}

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(
        path.is_file(),
        "Expected file to exist: {}",
        path.display()
    );
}

/// Assert that a directory exists.
pub fn assert_dir_exists(path: &Path) {
    assert!(
        path.is_dir(),
        "Expected directory to exist: {}",
        path.display()
    );
}

/// Assert that a path does not exist.
pub fn assert_not_exists(path: &Path) {
    assert!(
        !path.exists(),
        "Expected path to be absent: {}",
        path.display()
    );
}

/// Assert that a file contains expected content.
pub fn assert_file_contains(path: &Path, expected: &str) {
    let content =
        fs::read_to_string(path).unwrap_or_else(|_| panic!("Failed to read file: {}", path.display()));
    assert!(
        content.contains(expected),
        "File {} does not contain expected content.\nExpected to find: {}\nActual content: {}",
        path.display(),
        expected,
        content
    );
}
