//! Typed errors for the contractual failure classes.
//!
//! Most failures travel as `anyhow` chains with context attached at the
//! call site. The variants here are the ones callers and tests need to
//! tell apart: a configuration that can never build, an archive that fails
//! integrity verification, and a staging input that is missing outright.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecipeError {
    /// The requested option/host combination can never produce a working build.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Downloaded archive content does not match the pinned digest.
    #[error(
        "Checksum mismatch for {}\n  Expected: {expected}\n  Actual:   {actual}",
        .path.display()
    )]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// A file the packaging contract requires is not present.
    #[error("Missing expected file: {}", .0.display())]
    MissingArtifact(PathBuf),
}
