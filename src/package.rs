//! Package staging and metadata export.
//!
//! Assembles the distributable layout: `licenses/` with the upstream
//! license texts, `include/` and `lib/` from `make install`, with the
//! documentation tree removed and the libtool archive dropped (its embedded
//! paths are wrong once the package is relocated). Every step tolerates
//! re-running on the same build output.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::autotools::Autotools;
use crate::error::RecipeError;
use crate::source::defaults;

/// Libtool archive left behind by the install step.
const LIBTOOL_ARCHIVE: &str = "libgmp.la";

/// What the package provides, reported to whoever consumes it.
#[derive(Debug, Serialize)]
pub struct PackageManifest {
    pub name: String,
    pub version: String,
    pub package_dir: String,
    /// Link names of the libraries in `lib/`, sorted.
    pub libs: Vec<String>,
    pub licenses: Vec<String>,
    /// Requirements the host must provide before building (may be empty).
    pub build_requires: Vec<String>,
}

impl PackageManifest {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize package manifest")
    }

    /// Print the manifest to stdout, the only stdout output of a run.
    pub fn print(&self) -> Result<()> {
        println!("{}", self.to_json()?);
        Ok(())
    }
}

/// Copy the upstream license files into `licenses/`.
pub fn stage_licenses(source_dir: &Path, package_dir: &Path) -> Result<Vec<String>> {
    let licenses_dir = package_dir.join("licenses");
    fs::create_dir_all(&licenses_dir)
        .with_context(|| format!("Failed to create {}", licenses_dir.display()))?;

    let mut staged = Vec::new();
    for name in defaults::LICENSE_FILES {
        let src = source_dir.join(name);
        if !src.is_file() {
            return Err(RecipeError::MissingArtifact(src).into());
        }
        fs::copy(&src, licenses_dir.join(name))
            .with_context(|| format!("Failed to copy {}", src.display()))?;
        staged.push(name.to_string());
    }

    eprintln!("  Staged {} license files", staged.len());
    Ok(staged)
}

/// Remove what the package must not ship: the installed documentation tree
/// and the libtool archive for the main library (absent is fine).
pub fn prune(package_dir: &Path) -> Result<()> {
    let share = package_dir.join("share");
    if share.is_dir() {
        fs::remove_dir_all(&share)
            .with_context(|| format!("Failed to remove {}", share.display()))?;
        eprintln!("  Removed {}", share.display());
    }

    let la = package_dir.join("lib").join(LIBTOOL_ARCHIVE);
    if la.is_file() {
        fs::remove_file(&la)
            .with_context(|| format!("Failed to remove {}", la.display()))?;
        eprintln!("  Removed {}", la.display());
    }

    Ok(())
}

/// Discover the link names of the libraries in a directory.
///
/// `libgmp.a`, `libgmp.so.10.3.2` and `libgmp.10.dylib` all report as
/// `gmp`. Sorted and deduplicated, so a fixed package always reports the
/// same set.
pub fn collect_libs(lib_dir: &Path) -> Result<Vec<String>> {
    if !lib_dir.is_dir() {
        return Err(RecipeError::MissingArtifact(lib_dir.to_path_buf()).into());
    }

    let mut names = BTreeSet::new();
    for entry in
        fs::read_dir(lib_dir).with_context(|| format!("Failed to read {}", lib_dir.display()))?
    {
        let entry =
            entry.with_context(|| format!("Failed to read {}", lib_dir.display()))?;
        if let Some(name) = link_name(&entry.file_name().to_string_lossy()) {
            names.insert(name);
        }
    }

    Ok(names.into_iter().collect())
}

/// Map a library file name to its link name, or None for non-libraries.
fn link_name(file_name: &str) -> Option<String> {
    let base = file_name.strip_prefix("lib")?;

    // .so anywhere covers unversioned and versioned names (libgmp.so.10.3.2)
    if let Some(pos) = base.find(".so") {
        let rest = &base[pos + 3..];
        if rest.is_empty() || rest.starts_with('.') {
            let stem = &base[..pos];
            return (!stem.is_empty()).then(|| stem.to_string());
        }
        return None;
    }

    let (stem, ext) = base.rsplit_once('.')?;
    let stem = match ext {
        "a" => stem,
        // versioned dylibs carry the version before the extension (libgmp.10.dylib)
        "dylib" => stem_without_version(stem),
        _ => return None,
    };
    (!stem.is_empty()).then(|| stem.to_string())
}

fn stem_without_version(mut stem: &str) -> &str {
    while let Some((head, tail)) = stem.rsplit_once('.') {
        if tail.is_empty() || !tail.chars().all(|c| c.is_ascii_digit()) {
            break;
        }
        stem = head;
    }
    stem
}

/// Run the full staging stage against a completed build.
pub fn stage(
    autotools: &Autotools,
    source_dir: &Path,
    package_dir: &Path,
    build_requires: Vec<String>,
) -> Result<PackageManifest> {
    fs::create_dir_all(package_dir)
        .with_context(|| format!("Failed to create {}", package_dir.display()))?;

    let licenses = stage_licenses(source_dir, package_dir)?;
    autotools.install()?;
    prune(package_dir)?;

    let lib_dir = package_dir.join("lib");
    let libs = collect_libs(&lib_dir)?;
    if libs.is_empty() {
        bail!(
            "No libraries found under {} after install.\n\
             The build completed but produced nothing to link against.",
            lib_dir.display()
        );
    }

    eprintln!(
        "  Packaged {} files under {}",
        file_count(package_dir),
        package_dir.display()
    );

    Ok(PackageManifest {
        name: defaults::NAME.to_string(),
        version: defaults::VERSION.to_string(),
        package_dir: package_dir.display().to_string(),
        libs,
        licenses,
        build_requires,
    })
}

/// Number of regular files in the staged tree.
fn file_count(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_names_for_common_layouts() {
        assert_eq!(link_name("libgmp.a").as_deref(), Some("gmp"));
        assert_eq!(link_name("libgmpxx.a").as_deref(), Some("gmpxx"));
        assert_eq!(link_name("libgmp.so").as_deref(), Some("gmp"));
        assert_eq!(link_name("libgmp.so.10.3.2").as_deref(), Some("gmp"));
        assert_eq!(link_name("libgmp.dylib").as_deref(), Some("gmp"));
        assert_eq!(link_name("libgmp.10.dylib").as_deref(), Some("gmp"));
    }

    #[test]
    fn non_libraries_are_ignored() {
        assert_eq!(link_name("libgmp.la"), None);
        assert_eq!(link_name("gmp.pc"), None);
        assert_eq!(link_name("pkgconfig"), None);
        assert_eq!(link_name("lib"), None);
        assert_eq!(link_name("libgmp.settings"), None);
    }

    #[test]
    fn collect_libs_sorted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "libgmpxx.a",
            "libgmp.a",
            "libgmp.so",
            "libgmp.so.10.3.2",
            "gmp.pc",
        ] {
            fs::write(dir.path().join(name), "x").unwrap();
        }

        let libs = collect_libs(dir.path()).unwrap();
        assert_eq!(libs, vec!["gmp", "gmpxx"]);
    }

    #[test]
    fn collect_libs_missing_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_libs(&dir.path().join("lib")).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RecipeError>(),
            Some(RecipeError::MissingArtifact(_))
        ));
    }

    #[test]
    fn prune_removes_share_and_la() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path();
        fs::create_dir_all(package.join("share/doc")).unwrap();
        fs::write(package.join("share/doc/gmp.txt"), "manual").unwrap();
        fs::create_dir_all(package.join("lib")).unwrap();
        fs::write(package.join("lib/libgmp.la"), "la").unwrap();
        fs::write(package.join("lib/libgmp.a"), "a").unwrap();

        prune(package).unwrap();

        assert!(!package.join("share").exists());
        assert!(!package.join("lib/libgmp.la").exists());
        assert!(package.join("lib/libgmp.a").exists());

        // re-running on the pruned tree is a no-op
        prune(package).unwrap();
    }

    #[test]
    fn stage_licenses_requires_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        let package = dir.path().join("package");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("COPYINGv2"), "gpl").unwrap();

        let err = stage_licenses(&source, &package).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RecipeError>(),
            Some(RecipeError::MissingArtifact(_))
        ));

        fs::write(source.join("COPYING.LESSERv3"), "lgpl").unwrap();
        let staged = stage_licenses(&source, &package).unwrap();
        assert_eq!(staged, vec!["COPYINGv2", "COPYING.LESSERv3"]);
        assert!(package.join("licenses/COPYINGv2").is_file());

        // re-copy over existing files must not error
        stage_licenses(&source, &package).unwrap();
    }

    #[test]
    fn manifest_serializes_all_fields() {
        let manifest = PackageManifest {
            name: "gmp".to_string(),
            version: "6.1.2".to_string(),
            package_dir: "/tmp/pkg".to_string(),
            libs: vec!["gmp".to_string(), "gmpxx".to_string()],
            licenses: vec!["COPYINGv2".to_string(), "COPYING.LESSERv3".to_string()],
            build_requires: vec!["m4/1.4.18".to_string()],
        };

        let json: serde_json::Value =
            serde_json::from_str(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(json["name"], "gmp");
        assert_eq!(json["version"], "6.1.2");
        assert_eq!(json["libs"][0], "gmp");
        assert_eq!(json["build_requires"][0], "m4/1.4.18");
    }
}
