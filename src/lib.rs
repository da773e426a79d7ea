//! Gmpack library exports.
//!
//! Exposes the pipeline internals so integration tests can drive each
//! lifecycle stage directly.

pub mod autotools;
pub mod clean;
pub mod config;
pub mod error;
pub mod package;
pub mod patch;
pub mod preflight;
pub mod process;
pub mod recipe;
pub mod source;
pub mod timing;
