//! Platform directories for config and log files.

use std::path::PathBuf;
use crate::error::{SzError, SzResult};

/// Detected operating system platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// Detect the current platform at compile time.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Get the platform-specific application data directory.
    ///
    /// - Windows: `%APPDATA%/Stratizens`
    /// - macOS: `~/Library/Application Support/Stratizens`
    /// - Linux: `~/.local/share/Stratizens`
    pub fn data_dir() -> SzResult<PathBuf> {
        let base = dirs::data_dir()
            .ok_or_else(|| SzError::Config("could not determine data directory".into()))?;
        Ok(base.join("Stratizens"))
    }

    /// Get the platform-specific configuration directory.
    pub fn config_dir() -> SzResult<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| SzError::Config("could not determine config directory".into()))?;
        Ok(base.join("Stratizens"))
    }

    /// Get a human-readable platform name.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::MacOs => "macOS",
            Platform::Linux => "Linux",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_detection() {
        let p = Platform::current();
        assert!(matches!(p, Platform::Windows | Platform::MacOs | Platform::Linux));
    }

    #[test]
    fn test_platform_name() {
        assert_eq!(Platform::Windows.name(), "Windows");
        assert_eq!(Platform::MacOs.to_string(), "macOS");
        assert_eq!(Platform::Linux.name(), "Linux");
    }
}
