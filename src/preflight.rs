//! Host checks before building.
//!
//! Verifies the toolchain and the build-time dependency set before the
//! long part of the pipeline starts. Run with `gmpack preflight` to check
//! everything is ready.

use anyhow::{bail, Result};

use crate::config::BuildConfig;

/// Requirement declared when the host has no `m4` on its search path.
pub const M4_REQUIREMENT: &str = "m4/1.4.18";

/// Build-time requirements the host must provide.
///
/// The upstream build preprocesses its assembly sources with GNU m4. A host
/// that already carries the tool needs nothing declared; otherwise the
/// requirement is registered for the host to resolve.
pub fn build_requirements() -> Vec<String> {
    requirement_for(which::which("m4").is_ok())
}

fn requirement_for(m4_found: bool) -> Vec<String> {
    if m4_found {
        Vec::new()
    } else {
        vec![M4_REQUIREMENT.to_string()]
    }
}

/// Result of a single preflight check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed.
    Pass,
    /// Check failed - build will fail.
    Fail,
    /// Check passed but with a warning.
    Warn,
}

impl CheckResult {
    pub fn pass_with(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Pass,
            details: Some(details.to_string()),
        }
    }

    pub fn fail(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Fail,
            details: Some(details.to_string()),
        }
    }

    pub fn warn(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warn,
            details: Some(details.to_string()),
        }
    }
}

/// Results of all preflight checks.
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    /// Returns true if all checks passed (no failures).
    pub fn all_passed(&self) -> bool {
        !self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }

    /// Count of failed checks.
    pub fn fail_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .count()
    }

    /// Count of warnings.
    pub fn warn_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Warn)
            .count()
    }

    /// Print the report. Goes to stderr with the rest of the progress
    /// output; stdout is reserved for the package manifest.
    pub fn print(&self) {
        eprintln!("=== Preflight Check Results ===\n");

        for check in &self.checks {
            let (icon, status_str) = match check.status {
                CheckStatus::Pass => ("✓", "PASS"),
                CheckStatus::Fail => ("✗", "FAIL"),
                CheckStatus::Warn => ("⚠", "WARN"),
            };

            match &check.details {
                Some(details) => {
                    eprintln!("  {} [{}] {}: {}", icon, status_str, check.name, details)
                }
                None => eprintln!("  {} [{}] {}", icon, status_str, check.name),
            }
        }

        eprintln!();
        let total = self.checks.len();
        let passed = self
            .checks
            .iter()
            .filter(|c| c.status == CheckStatus::Pass)
            .count();
        let failed = self.fail_count();
        let warned = self.warn_count();

        eprintln!("Summary: {}/{} passed", passed, total);
        if failed > 0 {
            eprintln!("         {} FAILED - build will not succeed", failed);
        }
        if warned > 0 {
            eprintln!("         {} warnings", warned);
        }
    }
}

/// Run all preflight checks.
pub fn run_preflight(config: &BuildConfig) -> PreflightReport {
    let mut checks = Vec::new();

    checks.push(check_compiler(config));

    let required_tools = [
        ("make", "Required to drive the upstream build"),
        ("sh", "Required to run the configure script"),
    ];
    for (tool, purpose) in required_tools {
        checks.push(check_tool(tool, purpose));
    }

    checks.push(check_m4());

    PreflightReport { checks }
}

/// Run preflight and bail if any checks fail. The report is only printed
/// when something is wrong.
pub fn ensure_build_tools(config: &BuildConfig) -> Result<()> {
    let report = run_preflight(config);
    if !report.all_passed() {
        report.print();
        bail!(
            "Preflight failed: {} check(s) failed. Fix the issues above before building.",
            report.fail_count()
        );
    }
    Ok(())
}

/// The `preflight` subcommand: print the full report, fail on failures.
pub fn cmd_preflight(config: &BuildConfig) -> Result<()> {
    eprintln!("Running preflight checks...\n");
    let report = run_preflight(config);
    report.print();

    if !report.all_passed() {
        bail!(
            "Preflight failed: {} check(s) failed. Fix the issues above before building.",
            report.fail_count()
        );
    }

    eprintln!("\nAll preflight checks passed!");
    Ok(())
}

/// Check if a tool exists in PATH.
fn check_tool(tool: &str, purpose: &str) -> CheckResult {
    match which::which(tool) {
        Ok(path) => CheckResult::pass_with(tool, &path.display().to_string()),
        Err(_) => CheckResult::fail(tool, &format!("Not found. {}", purpose)),
    }
}

/// Check for a C compiler matching the configured host descriptor, with
/// `cc` as the fallback.
fn check_compiler(config: &BuildConfig) -> CheckResult {
    let binary = compiler_binary(&config.host.compiler);

    if let Ok(path) = which::which(binary) {
        return CheckResult::pass_with(binary, &path.display().to_string());
    }
    if let Ok(path) = which::which("cc") {
        return CheckResult::warn(
            binary,
            &format!("Not found, but cc is available at {}", path.display()),
        );
    }
    CheckResult::fail(binary, "No C compiler found. Install gcc or clang.")
}

/// Executable name for a compiler descriptor.
fn compiler_binary(compiler: &str) -> &'static str {
    match compiler {
        "gcc" => "gcc",
        "clang" | "apple-clang" => "clang",
        "msvc" => "cl",
        _ => "cc",
    }
}

fn check_m4() -> CheckResult {
    match which::which("m4") {
        Ok(path) => CheckResult::pass_with("m4", &path.display().to_string()),
        Err(_) => CheckResult::warn(
            "m4",
            &format!("Not found. Declaring build requirement '{}'.", M4_REQUIREMENT),
        ),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirement_declared_only_when_m4_missing() {
        assert!(requirement_for(true).is_empty());
        assert_eq!(requirement_for(false), vec![M4_REQUIREMENT.to_string()]);
    }

    #[test]
    fn check_tool_finds_sh() {
        let result = check_tool("sh", "");
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(result.details.is_some());
    }

    #[test]
    fn check_tool_reports_missing_tool() {
        let result = check_tool("definitely-not-a-real-tool-xyz", "Needed for testing");
        assert_eq!(result.status, CheckStatus::Fail);
        assert!(result.details.as_deref().unwrap().contains("Not found"));
    }

    #[test]
    fn compiler_binaries_for_descriptors() {
        assert_eq!(compiler_binary("gcc"), "gcc");
        assert_eq!(compiler_binary("apple-clang"), "clang");
        assert_eq!(compiler_binary("msvc"), "cl");
        assert_eq!(compiler_binary("intel"), "cc");
    }

    #[test]
    fn report_counts_and_overall_status() {
        let report = PreflightReport {
            checks: vec![
                CheckResult::pass_with("make", "/usr/bin/make"),
                CheckResult::warn("m4", "Not found"),
                CheckResult::fail("gcc", "Not found"),
            ],
        };
        assert!(!report.all_passed());
        assert_eq!(report.fail_count(), 1);
        assert_eq!(report.warn_count(), 1);

        let all_good = PreflightReport {
            checks: vec![
                CheckResult::pass_with("make", "/usr/bin/make"),
                CheckResult::warn("m4", "Not found"),
            ],
        };
        assert!(all_good.all_passed());
    }
}
