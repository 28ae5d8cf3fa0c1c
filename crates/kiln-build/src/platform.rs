//! Host platform resolution

use crate::error::{BuildError, BuildResult};
use std::fmt;
use std::str::FromStr;

/// Operating system the build runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
}

impl Platform {
    /// Resolve the platform this process is running on
    pub fn host() -> BuildResult<Self> {
        std::env::consts::OS.parse()
    }

    /// Canonical lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::MacOs => "macos",
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Self::Windows)
    }
}

impl FromStr for Platform {
    type Err = BuildError;

    fn from_str(s: &str) -> BuildResult<Self> {
        match s.to_lowercase().as_str() {
            "windows" | "win32" | "cygwin" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            "macos" | "darwin" => Ok(Self::MacOs),
            other => Err(BuildError::UnsupportedPlatform(other.to_string())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_platforms() {
        assert_eq!("linux".parse::<Platform>().unwrap(), Platform::Linux);
        assert_eq!("Darwin".parse::<Platform>().unwrap(), Platform::MacOs);
        assert_eq!("win32".parse::<Platform>().unwrap(), Platform::Windows);
    }

    #[test]
    fn test_unknown_platform_rejected() {
        assert!(matches!(
            "freebsd".parse::<Platform>(),
            Err(BuildError::UnsupportedPlatform(_))
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_host_resolves() {
        assert_eq!(Platform::host().unwrap(), Platform::Linux);
    }
}
