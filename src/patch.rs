//! Platform-conditional patches for the extracted source tree.
//!
//! Each patch pairs a host predicate with an action, keeping platform
//! variance in one table instead of branches scattered through the build
//! stage.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::config::HostProfile;

pub struct SourcePatch {
    pub name: &'static str,
    applies: fn(&HostProfile) -> bool,
    apply: fn(&Path) -> Result<()>,
}

/// All known patches, in application order.
const PATCHES: &[SourcePatch] = &[SourcePatch {
    name: "relocatable-install-name",
    applies: on_macos,
    apply: relocatable_install_name,
}];

fn on_macos(host: &HostProfile) -> bool {
    host.is_macos()
}

/// Apply every patch whose predicate matches the host.
pub fn apply_patches(host: &HostProfile, source_dir: &Path) -> Result<()> {
    for patch in PATCHES {
        if (patch.applies)(host) {
            eprintln!("  Applying source patch: {}", patch.name);
            (patch.apply)(source_dir)
                .with_context(|| format!("Patch '{}' failed", patch.name))?;
        }
    }
    Ok(())
}

/// The vendor configure script hardcodes an install-name prefix that breaks
/// relocatable packaging; rewrite it to a bare `-install_name` and restore
/// the script's exec bit, which text rewrites do not reliably preserve.
fn relocatable_install_name(source_dir: &Path) -> Result<()> {
    const BROKEN: &str = r"-install_name \$rpath/";
    const FIXED: &str = "-install_name ";

    let configure = source_dir.join("configure");
    let text = fs::read_to_string(&configure)
        .with_context(|| format!("Failed to read {}", configure.display()))?;

    if !text.contains(BROKEN) {
        if text.contains(FIXED) {
            eprintln!("  [SKIP] configure already patched");
            return Ok(());
        }
        bail!(
            "Expected `{}` in {}, found nothing to patch",
            BROKEN,
            configure.display()
        );
    }

    fs::write(&configure, text.replace(BROKEN, FIXED))
        .with_context(|| format!("Failed to write {}", configure.display()))?;
    restore_exec_bit(&configure)
}

/// Re-add the owner execute bit.
fn restore_exec_bit(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        let mut perms = metadata.permissions();
        perms.set_mode(perms.mode() | 0o100);
        fs::set_permissions(path, perms)
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
