//! Removes build state from the work directory.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::recipe::RecipeContext;

/// Clean target for the clean command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanTarget {
    /// Source tree and staged package (default, preserves downloads)
    Outputs,
    /// Downloaded archives
    Downloads,
    /// Everything
    All,
}

/// Execute the clean command.
pub fn cmd_clean(work_dir: &Path, target: CleanTarget) -> Result<()> {
    match target {
        CleanTarget::Outputs => clean_outputs(work_dir),
        CleanTarget::Downloads => clean_downloads(work_dir),
        CleanTarget::All => clean_all(work_dir),
    }
}

/// Clean the extracted source tree and the staged package (preserves
/// downloads, so the next run skips the fetch).
pub fn clean_outputs(work_dir: &Path) -> Result<()> {
    let ctx = RecipeContext::new(work_dir)?;

    let mut cleaned = false;
    cleaned |= remove_tree(&ctx.source_dir())?;
    cleaned |= remove_tree(&ctx.package_dir())?;

    if cleaned {
        eprintln!("Clean complete (downloads preserved).");
    } else {
        eprintln!("Nothing to clean.");
    }
    Ok(())
}

/// Clean downloaded archives.
pub fn clean_downloads(work_dir: &Path) -> Result<()> {
    let ctx = RecipeContext::new(work_dir)?;

    if remove_tree(&ctx.downloads_dir())? {
        eprintln!("Downloads cleaned.");
    } else {
        eprintln!("No downloads to clean.");
    }
    Ok(())
}

/// Clean everything (downloads + outputs).
pub fn clean_all(work_dir: &Path) -> Result<()> {
    let ctx = RecipeContext::new(work_dir)?;

    let mut cleaned = false;
    cleaned |= remove_tree(&ctx.source_dir())?;
    cleaned |= remove_tree(&ctx.package_dir())?;
    cleaned |= remove_tree(&ctx.downloads_dir())?;

    if cleaned {
        eprintln!("Full clean complete.");
    } else {
        eprintln!("Nothing to clean.");
    }
    Ok(())
}

/// Remove a directory tree if present. Returns whether anything was removed.
fn remove_tree(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    eprintln!("Removing {}...", dir.display());
    fs::remove_dir_all(dir).with_context(|| format!("Failed to remove {}", dir.display()))?;
    Ok(true)
}

// =============================================================================
// Tests
// =============================================================================
