//! ValidationOracle - ots-sanitize as a pass/fail check
//!
//! Only byte-identical outputs are sanitized. A missing sanitizer is not an
//! error; the runner prints a notice once and skips validation.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use super::traits::{Sanitizer, Validation};

/// Program name searched on `PATH`
pub const OTS_PROGRAM: &str = "ots-sanitize";

/// [`Sanitizer`] backed by the OpenType Sanitizer command-line tool
#[derive(Debug, Clone, Default)]
pub struct OtsSanitizer {
    binary: Option<PathBuf>,
}

impl OtsSanitizer {
    /// Use an explicit binary, or none
    pub fn with_binary(binary: Option<PathBuf>) -> Self {
        Self { binary }
    }

    /// A sanitizer that is never available
    pub fn disabled() -> Self {
        Self { binary: None }
    }

    /// The binary in use, if any
    pub fn binary(&self) -> Option<&Path> {
        self.binary.as_deref()
    }
}

impl Sanitizer for OtsSanitizer {
    fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    fn validate(&self, path: &Path) -> Validation {
        // Without a sanitizer nothing can be confirmed.
        let Some(binary) = &self.binary else {
            return Validation::Rejected {
                report: format!("{OTS_PROGRAM} is not available"),
            };
        };

        debug!(font = %path.display(), "sanitizing");
        let output = match Command::new(binary).arg(path).env("LC_ALL", "C").output() {
            Ok(output) => output,
            Err(err) => {
                return Validation::Rejected {
                    report: format!("failed to run {}: {err}", binary.display()),
                };
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !stderr.is_empty() {
            warn!(font = %path.display(), %stderr, "sanitizer wrote to stderr");
        }

        if output.status.success() {
            return Validation::Accepted;
        }

        let report = [stdout, stderr]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Validation::Rejected {
            report: if report.is_empty() {
                format!("{OTS_PROGRAM} exited with {}", output.status)
            } else {
                report
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_sanitizer() {
        let sanitizer = OtsSanitizer::disabled();
        assert!(!sanitizer.is_available());
        assert!(!sanitizer.validate(Path::new("font.ttf")).is_accepted());
    }

    #[test]
    fn test_unrunnable_binary_rejects() {
        let sanitizer = OtsSanitizer::with_binary(Some(PathBuf::from("/nonexistent/ots-sanitize")));
        match sanitizer.validate(Path::new("font.ttf")) {
            Validation::Rejected { report } => assert!(report.contains("failed to run")),
            Validation::Accepted => panic!("missing binary cannot accept"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_decides() {
        let (Ok(truthy), Ok(falsy)) = (which::which("true"), which::which("false")) else {
            return;
        };
        let font = Path::new("font.ttf");

        assert_eq!(
            OtsSanitizer::with_binary(Some(truthy)).validate(font),
            Validation::Accepted
        );
        match OtsSanitizer::with_binary(Some(falsy)).validate(font) {
            Validation::Rejected { report } => assert!(report.contains("exited with")),
            Validation::Accepted => panic!("non-zero exit must reject"),
        }
    }
}
