//! Optional capabilities, resolved once at startup

use serde::Serialize;
use std::ffi::OsStr;
use std::path::Path;
use tracing::info;

/// Executable whose presence means a SANE scanner front end is installed
pub const SCANNER_PROGRAM: &str = "scanimage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities {
    scanner: bool,
    tesseract: bool,
}

impl Capabilities {
    /// Inspect the host environment
    pub fn detect() -> Self {
        let path = std::env::var_os("PATH").unwrap_or_default();
        let caps = Self {
            scanner: find_program(&path, SCANNER_PROGRAM),
            tesseract: cfg!(feature = "tesseract"),
        };
        info!(scanner = caps.scanner, tesseract = caps.tesseract, "capabilities detected");
        caps
    }

    /// Fixed capabilities, for embedding and tests
    pub fn new(scanner: bool, tesseract: bool) -> Self {
        Self { scanner, tesseract }
    }

    pub fn supports_scanner(&self) -> bool {
        self.scanner
    }

    /// Whether the Tesseract engine was compiled in
    pub fn supports_tesseract(&self) -> bool {
        self.tesseract
    }
}

/// Look for an executable named `program` on a PATH-style search list
fn find_program(search_path: &OsStr, program: &str) -> bool {
    std::env::split_paths(search_path).any(|dir| is_executable(&dir.join(program)))
}

#[cfg(unix)]
fn is_executable(candidate: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    candidate
        .metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(candidate: &Path) -> bool {
    candidate.with_extension("exe").is_file() || candidate.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use tempfile::TempDir;

    #[test]
    fn test_find_program_on_path() {
        let dir = TempDir::new().unwrap();
        let program = dir.path().join("scanimage");
        std::fs::write(&program, "#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let search = std::env::join_paths([Path::new("/nonexistent"), dir.path()]).unwrap();
        assert!(find_program(&search, SCANNER_PROGRAM));
        assert!(!find_program(&search, "no-such-program"));
    }

    #[test]
    fn test_empty_path_has_no_scanner() {
        assert!(!find_program(&OsString::new(), SCANNER_PROGRAM));
    }

    #[test]
    fn test_detect_reports_compiled_engine() {
        assert_eq!(
            Capabilities::detect().supports_tesseract(),
            cfg!(feature = "tesseract")
        );
    }

    #[test]
    fn test_fixed_capabilities() {
        let caps = Capabilities::new(true, false);
        assert!(caps.supports_scanner());
        assert!(!caps.supports_tesseract());
        assert!(!Capabilities::default().supports_scanner());
    }
}
