//! Build configuration: user-selected options plus host descriptors.
//!
//! Resolved once at startup and validated before any filesystem or network
//! side effect. After `BuildConfig::resolve` succeeds the configuration is
//! read-only; no stage mutates it.
//!
//! Host descriptors come from `GMPACK_*` environment variables (a `.env`
//! file is honored, loaded in main) with platform-detected defaults:
//!
//! | Variable                | Default                      |
//! |-------------------------|------------------------------|
//! | GMPACK_OS               | detected (linux, macos, ...) |
//! | GMPACK_ARCH             | detected (x86_64, aarch64)   |
//! | GMPACK_COMPILER         | per-OS default               |
//! | GMPACK_COMPILER_VERSION | unset                        |
//! | GMPACK_BUILD_TYPE       | release                      |
//! | GMPACK_LIBCXX           | per-compiler default         |
//! | GMPACK_CPPSTD           | unset                        |

use crate::error::RecipeError;

/// User-selectable build options.
///
/// Defaults match the published recipe: static library, position-independent
/// code, no assembly specializations, upstream checks off, C++ binding on.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Build a shared library instead of a static one.
    pub shared: bool,
    /// Compile with position-independent code.
    pub fpic: bool,
    /// Disable architecture-specific assembly, trading speed for portability.
    pub disable_assembly: bool,
    /// Run the upstream test suite after building.
    ///
    /// Off by default: the suite passes reliably upstream but routinely
    /// times out in constrained CI environments.
    pub run_checks: bool,
    /// Build the C++ binding (gmpxx) alongside the C library.
    pub enable_cxx: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            shared: false,
            fpic: true,
            disable_assembly: true,
            run_checks: false,
            enable_cxx: true,
        }
    }
}

/// Build variant requested from the external toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildType {
    Release,
    Debug,
}

impl BuildType {
    /// Lenient parse; anything that is not "debug" builds release.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("debug") {
            Self::Debug
        } else {
            Self::Release
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Debug => "debug",
        }
    }
}

/// Descriptors of the machine and toolchain the package is built with.
#[derive(Debug, Clone)]
pub struct HostProfile {
    pub os: String,
    pub arch: String,
    pub compiler: String,
    pub compiler_version: Option<String>,
    pub build_type: BuildType,
    /// C++ standard library flavor (e.g. libstdc++11, libc++).
    pub libcxx: Option<String>,
    /// C++ language standard (e.g. 17, gnu17).
    pub cppstd: Option<String>,
}

impl HostProfile {
    /// Resolve the host profile from environment overrides and detection.
    pub fn from_env() -> Self {
        let os = env_or("GMPACK_OS", std::env::consts::OS).to_lowercase();
        let arch = env_or("GMPACK_ARCH", std::env::consts::ARCH);
        let compiler = env_or("GMPACK_COMPILER", default_compiler(&os)).to_lowercase();
        let libcxx = env_opt("GMPACK_LIBCXX").or_else(|| {
            default_libcxx(&compiler).map(String::from)
        });

        Self {
            os,
            arch,
            compiler_version: env_opt("GMPACK_COMPILER_VERSION"),
            build_type: BuildType::parse(&env_or("GMPACK_BUILD_TYPE", "release")),
            libcxx,
            cppstd: env_opt("GMPACK_CPPSTD"),
            compiler,
        }
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    pub fn is_macos(&self) -> bool {
        self.os == "macos"
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn default_compiler(os: &str) -> &'static str {
    match os {
        "windows" => "msvc",
        "macos" => "apple-clang",
        _ => "gcc",
    }
}

fn default_libcxx(compiler: &str) -> Option<&'static str> {
    match compiler {
        "apple-clang" => Some("libc++"),
        "gcc" | "clang" => Some("libstdc++11"),
        _ => None,
    }
}

/// The resolved, validated configuration handed to every later stage.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub options: BuildOptions,
    pub host: HostProfile,
}

impl BuildConfig {
    /// Validate options against the host and freeze the result.
    ///
    /// Pure over its inputs: no filesystem or network access happens here,
    /// so a rejected configuration leaves nothing behind. When the C++
    /// binding is off, the ABI settings (libcxx, cppstd) are stripped;
    /// they cannot affect an all-C package.
    pub fn resolve(options: BuildOptions, mut host: HostProfile) -> Result<Self, RecipeError> {
        if host.is_windows() && host.compiler == "msvc" {
            return Err(RecipeError::InvalidConfiguration(
                "The gmp package cannot be deployed on Visual Studio.".to_string(),
            ));
        }

        if !options.enable_cxx {
            host.libcxx = None;
            host.cppstd = None;
        }

        Ok(Self { options, host })
    }

    /// Print the resolved configuration. Goes to stderr with the rest of
    /// the progress output; stdout is reserved for the package manifest.
    pub fn print(&self) {
        let unset = "(unset)".to_string();

        eprintln!("=== Build Configuration ===");
        eprintln!("  os:                {}", self.host.os);
        eprintln!("  arch:              {}", self.host.arch);
        match &self.host.compiler_version {
            Some(version) => eprintln!("  compiler:          {} {}", self.host.compiler, version),
            None => eprintln!("  compiler:          {}", self.host.compiler),
        }
        eprintln!("  build_type:        {}", self.host.build_type.as_str());
        eprintln!("  libcxx:            {}", self.host.libcxx.as_ref().unwrap_or(&unset));
        eprintln!("  cppstd:            {}", self.host.cppstd.as_ref().unwrap_or(&unset));
        eprintln!();
        eprintln!("  shared:            {}", self.options.shared);
        eprintln!("  fpic:              {}", self.options.fpic);
        eprintln!("  disable_assembly:  {}", self.options.disable_assembly);
        eprintln!("  run_checks:        {}", self.options.run_checks);
        eprintln!("  enable_cxx:        {}", self.options.enable_cxx);
    }
}

// =============================================================================
// Tests
// =============================================================================
