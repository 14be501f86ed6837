//! Account management works very differently depending on the kernel
//! underneath. Utilities in this module decide which of the two supported
//! account backends is in charge of the running host
use std::path::Path;

use crate::utils::error::AccountError;

/// The two account models this tool knows how to drive
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum Platform {
    /// Shadow password database, managed by the shadow-utils binaries
    #[strum(to_string = "Linux")]
    Linux,
    /// Per-record attribute store, managed through dscl
    #[strum(to_string = "directory services")]
    DirectoryService,
}

impl TryFrom<&str> for Platform {
    type Error = AccountError;

    fn try_from(kernel: &str) -> Result<Self, Self::Error> {
        match kernel.trim() {
            "Linux" => Ok(Platform::Linux),
            "Darwin" => Ok(Platform::DirectoryService),
            other => Err(AccountError::UnsupportedPlatform(other.to_string())),
        }
    }
}

impl Platform {
    /// Identify the running kernel. Called exactly once, from `main`; the
    /// result is handed to everything else so it can't change mid run
    pub fn detect() -> eyre::Result<Self> {
        let uts = nix::sys::utsname::uname()?;
        let kernel = uts.sysname().to_string_lossy();
        tracing::debug!("Kernel name reported as {kernel}");

        Ok(Platform::try_from(&*kernel)?)
    }

    /// Directory new home directories are created under
    pub fn home_base(self) -> &'static Path {
        match self {
            Platform::Linux => Path::new("/home"),
            Platform::DirectoryService => Path::new("/Users"),
        }
    }

    pub fn default_shell(self) -> &'static str {
        match self {
            Platform::Linux => "/bin/bash",
            Platform::DirectoryService => "/bin/zsh",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kernels() {
        assert_eq!(Platform::try_from("Linux").ok(), Some(Platform::Linux));
        assert_eq!(
            Platform::try_from("Darwin\n").ok(),
            Some(Platform::DirectoryService)
        );
    }

    #[test]
    fn anything_else_is_unsupported() {
        for kernel in ["FreeBSD", "linux", "", "Windows_NT"] {
            let err = Platform::try_from(kernel).expect_err("should be unsupported");
            assert!(matches!(err, AccountError::UnsupportedPlatform(_)));
            assert!(err.to_string().starts_with("unsupported platform"));
        }
    }

    #[test]
    fn home_bases() {
        assert_eq!(Platform::Linux.home_base(), Path::new("/home"));
        assert_eq!(Platform::DirectoryService.home_base(), Path::new("/Users"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn detects_this_host() {
        assert_eq!(Platform::detect().ok(), Some(Platform::Linux));
    }
}
