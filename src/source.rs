//! Source acquisition for the pinned upstream release.
//!
//! Downloads the official tarball, verifies it against the pinned SHA-256,
//! extracts it and renames the versioned directory to a stable name so later
//! stages never care about the version string. Verified archives are kept in
//! a checksum-keyed cache under the user cache directory, so repeated builds
//! do not hit the network.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::RecipeError;

/// Version-independent name the extracted tree is renamed to.
pub const SOURCE_DIR: &str = "source";

/// Pinned identity of the upstream release.
pub mod defaults {
    /// Upstream package name.
    pub const NAME: &str = "gmp";

    /// Pinned version; the checksum below matches exactly this release.
    pub const VERSION: &str = "6.1.2";

    /// Upstream project homepage.
    pub const HOMEPAGE: &str = "https://gmplib.org";

    /// SHA-256 of the release tarball.
    pub const SHA256: &str = "5275bb04f4863a13516b2f39392ac5e272f5e1bb8057b18aec1c9b79d73d8fb2";

    /// License files shipped at the source-tree root.
    pub const LICENSE_FILES: [&str; 2] = ["COPYINGv2", "COPYING.LESSERv3"];

    /// File name of the release tarball.
    pub fn archive_name() -> String {
        format!("{}-{}.tar.bz2", NAME, VERSION)
    }

    /// Canonical download URL.
    pub fn download_url() -> String {
        format!("{}/download/gmp/{}", HOMEPAGE, archive_name())
    }

    /// Name of the directory the tarball extracts to.
    pub fn versioned_dir() -> String {
        format!("{}-{}", NAME, VERSION)
    }
}

/// Compute the SHA-256 of a file, streaming in 1 MiB chunks.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open {} for hashing", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Verify a file against an expected SHA-256, removing it on mismatch.
///
/// A mismatch is an integrity failure: the bad file is deleted so a later
/// run cannot pick it up, and the error carries both digests.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    if !actual.eq_ignore_ascii_case(expected) {
        fs::remove_file(path).ok();
        return Err(RecipeError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        }
        .into());
    }
    Ok(())
}

/// Download a URL to a local path, staging through a `.part` file.
fn download_file(url: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    eprintln!("  Downloading {}", url);

    let mut response = reqwest::blocking::get(url)
        .with_context(|| format!("Failed to download {}", url))?
        .error_for_status()
        .with_context(|| format!("Server rejected download of {}", url))?;

    let file_name = dest.file_name().and_then(|n| n.to_str()).unwrap_or("archive");
    let part = dest.with_file_name(format!("{}.part", file_name));

    let mut out = File::create(&part)
        .with_context(|| format!("Failed to create {}", part.display()))?;
    let bytes = std::io::copy(&mut response, &mut out)
        .with_context(|| format!("Failed writing {}", part.display()))?;
    drop(out);

    fs::rename(&part, dest)
        .with_context(|| format!("Failed to move {} into place", part.display()))?;

    eprintln!("  Downloaded {} ({:.1} MB)", file_name, bytes as f64 / 1_048_576.0);
    Ok(())
}

/// Location of this archive in the checksum-keyed cache, if the platform
/// has a user cache directory.
pub fn cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| {
        dir.join("gmpack")
            .join(defaults::SHA256)
            .join(defaults::archive_name())
    })
}

/// Copy the archive out of the cache. Best-effort: any failure means a
/// fresh download instead.
fn restore_from_cache(dest: &Path) -> bool {
    let Some(cached) = cache_path() else {
        return false;
    };
    if !cached.is_file() {
        return false;
    }
    if let Some(parent) = dest.parent() {
        if fs::create_dir_all(parent).is_err() {
            return false;
        }
    }
    match fs::copy(&cached, dest) {
        Ok(_) => {
            eprintln!("  Using cached archive: {}", cached.display());
            true
        }
        Err(_) => false,
    }
}

/// Store a verified archive in the cache. Best-effort.
///
/// Staged through a `.part` name and renamed, so an interrupted copy can
/// never leave a truncated entry behind.
fn store_in_cache(archive: &Path) {
    let Some(cached) = cache_path() else {
        return;
    };
    if cached.is_file() {
        return;
    }
    let Some(parent) = cached.parent() else {
        return;
    };
    if fs::create_dir_all(parent).is_err() {
        return;
    }
    let staging = cached.with_file_name(format!("{}.part", defaults::archive_name()));
    if fs::copy(archive, &staging).is_ok() {
        fs::rename(&staging, &cached).ok();
    }
}

/// Drop the cache entry for this archive. Best-effort.
fn evict_cache_entry() {
    if let Some(cached) = cache_path() {
        fs::remove_file(&cached).ok();
    }
}

/// Restore the archive from the cache and verify it.
///
/// A cache entry that fails verification is evicted, so it cannot poison
/// every later run; the caller falls back to a fresh download.
fn restore_verified_from_cache(dest: &Path) -> bool {
    if !restore_from_cache(dest) {
        return false;
    }
    eprintln!("  Verifying SHA-256...");
    if verify_sha256(dest, defaults::SHA256).is_err() {
        eprintln!("  Cached archive failed verification, evicting it");
        evict_cache_entry();
        return false;
    }
    true
}

/// Fetch the release archive into the downloads directory and verify it.
///
/// An archive already present locally is verified rather than re-downloaded,
/// and a verified copy from the cache skips the network entirely. A corrupt
/// cache entry is evicted and replaced by a fresh download; a mismatch on
/// the local or downloaded archive is fatal.
pub fn fetch_archive(downloads_dir: &Path) -> Result<PathBuf> {
    let archive = downloads_dir.join(defaults::archive_name());

    if archive.is_file() {
        eprintln!("  Archive already present: {}", archive.display());
    } else if restore_verified_from_cache(&archive) {
        return Ok(archive);
    } else {
        download_file(&defaults::download_url(), &archive)?;
    }

    eprintln!("  Verifying SHA-256...");
    verify_sha256(&archive, defaults::SHA256)?;
    store_in_cache(&archive);

    Ok(archive)
}

/// Extract a `.tar.bz2` archive into `dest_dir`.
pub fn extract_archive(archive: &Path, dest_dir: &Path) -> Result<()> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open {}", archive.display()))?;
    let decoder = bzip2::read::BzDecoder::new(file);
    let mut tar = tar::Archive::new(decoder);
    tar.unpack(dest_dir).with_context(|| {
        format!(
            "Failed to extract {} into {}",
            archive.display(),
            dest_dir.display()
        )
    })?;
    Ok(())
}

/// Extract the archive and rename the versioned directory to `source/`.
pub fn extract_and_rename(archive: &Path, work_dir: &Path) -> Result<PathBuf> {
    let versioned = work_dir.join(defaults::versioned_dir());
    let source_dir = work_dir.join(SOURCE_DIR);

    eprintln!("  Extracting {}...", archive.display());
    extract_archive(archive, work_dir)?;

    if !versioned.is_dir() {
        bail!(
            "Archive did not contain the expected {}/ directory",
            defaults::versioned_dir()
        );
    }
    fs::rename(&versioned, &source_dir).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            versioned.display(),
            source_dir.display()
        )
    })?;

    eprintln!("  Source tree ready: {}", source_dir.display());
    Ok(source_dir)
}

/// Run the full acquisition stage: fetch, verify, extract, rename.
///
/// Skips work that is already verifiably complete: an extracted tree with
/// a configure script short-circuits the whole stage.
pub fn prepare_source(work_dir: &Path, downloads_dir: &Path) -> Result<PathBuf> {
    let source_dir = work_dir.join(SOURCE_DIR);

    if source_dir.join("configure").is_file() {
        eprintln!("  [SKIP] Source tree already prepared: {}", source_dir.display());
        return Ok(source_dir);
    }
    if source_dir.exists() {
        bail!(
            "Source directory {} exists but has no configure script.\n\
             It looks like a previous extraction was interrupted.\n\
             Run `gmpack clean` and retry.",
            source_dir.display()
        );
    }

    let archive = fetch_archive(downloads_dir)?;
    extract_and_rename(&archive, work_dir)
}

// =============================================================================
// Tests
// =============================================================================
