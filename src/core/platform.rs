//! Target platform model.
//!
//! A platform names its default toolchain, contributes auto-injected
//! preprocessor definitions and compiler flags, and knows whether it is the
//! host.

use crate::core::module::Define;

/// CPU architecture of a target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    X86,
    X86_64,
    Aarch64,
    Arm,
}

impl Architecture {
    /// Detect the host architecture.
    pub fn host() -> Architecture {
        match std::env::consts::ARCH {
            "x86" => Architecture::X86,
            "aarch64" => Architecture::Aarch64,
            "arm" => Architecture::Arm,
            _ => Architecture::X86_64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::X86 => "x86",
            Architecture::X86_64 => "x86_64",
            Architecture::Aarch64 => "aarch64",
            Architecture::Arm => "arm",
        }
    }
}

/// A target platform.
pub trait Platform: Send + Sync {
    /// Registry name of the platform.
    fn name(&self) -> &str;

    /// Registry name of the toolchain used when neither the module nor the
    /// CLI names one.
    fn default_toolchain(&self) -> &str;

    /// Preprocessor definitions injected into every compilation for this
    /// platform.
    fn definitions(&self) -> Vec<Define>;

    /// Compiler flags injected into every compilation for this platform.
    fn compiler_flags(&self) -> Vec<String>;

    /// Architecture of the platform.
    fn architecture(&self) -> Architecture;

    /// Whether this platform is the machine the build runs on.
    fn is_host(&self) -> bool;
}

/// Registry name of the platform the current process runs on.
pub fn host_platform_name() -> &'static str {
    if cfg!(windows) {
        "win32"
    } else {
        "unix"
    }
}

/// Unix-like platforms (Linux, the BSDs, macOS).
#[derive(Debug, Default)]
pub struct UnixPlatform;

impl Platform for UnixPlatform {
    fn name(&self) -> &str {
        "unix"
    }

    fn default_toolchain(&self) -> &str {
        "gcc"
    }

    fn definitions(&self) -> Vec<Define> {
        Vec::new()
    }

    fn compiler_flags(&self) -> Vec<String> {
        Vec::new()
    }

    fn architecture(&self) -> Architecture {
        Architecture::host()
    }

    fn is_host(&self) -> bool {
        !cfg!(windows)
    }
}

/// Win32-family platforms.
#[derive(Debug, Default)]
pub struct Win32Platform;

impl Platform for Win32Platform {
    fn name(&self) -> &str {
        "win32"
    }

    fn default_toolchain(&self) -> &str {
        "msvc"
    }

    fn definitions(&self) -> Vec<Define> {
        vec![Define::flag("UNICODE"), Define::flag("_UNICODE")]
    }

    fn compiler_flags(&self) -> Vec<String> {
        Vec::new()
    }

    fn architecture(&self) -> Architecture {
        Architecture::host()
    }

    fn is_host(&self) -> bool {
        cfg!(windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_builtin_platform_is_host() {
        let platforms: Vec<Box<dyn Platform>> =
            vec![Box::new(UnixPlatform), Box::new(Win32Platform)];
        let hosts = platforms.iter().filter(|p| p.is_host()).count();
        assert_eq!(hosts, 1);
    }

    #[test]
    fn test_default_toolchains() {
        assert_eq!(UnixPlatform.default_toolchain(), "gcc");
        assert_eq!(Win32Platform.default_toolchain(), "msvc");
    }

    #[test]
    fn test_win32_injects_unicode_defines() {
        let defines = Win32Platform.definitions();
        assert!(defines.contains(&Define::flag("UNICODE")));
    }
}
