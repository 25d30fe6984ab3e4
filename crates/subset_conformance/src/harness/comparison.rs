//! EquivalenceChecker - Tiered comparison of expected vs produced fonts
//!
//! Strategies run in order and the first one that can decide wins:
//!
//! 1. byte-exact match, the only passing outcome
//! 2. decoder availability
//! 3. structural decode of both sides
//! 4. text comparison of the two dumps, with a unified diff on mismatch
//!
//! Steps 2-4 never pass a case. A byte mismatch is always a failure; the
//! structural steps only tell a maintainer whether the engine changed
//! behaviour or the recorded fixture is stale.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use super::traits::StructuralDecoder;

/// Which of the two compared files an outcome refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The recorded fixture
    Expected,
    /// The freshly produced font
    Actual,
}

impl Side {
    /// Get the string name of the side
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Expected => "expected",
            Side::Actual => "actual",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A font binary held in memory next to the path it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFile {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl FontFile {
    /// Read a font fully
    pub fn load(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let bytes = fs::read(&path)?;
        Ok(Self { path, bytes })
    }

    /// Wrap bytes that were already read from `path`
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }

    /// Where the bytes came from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Result of comparing an expected and an actual font
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparisonOutcome {
    /// Files are byte-for-byte identical
    ByteIdentical,
    /// One of the files could not be read
    Unreadable { side: Side, error: String },
    /// Bytes differ and no structural decoder is installed
    DecoderUnavailable,
    /// Bytes differ and one side failed to decode
    DecodeFailed { side: Side, error: String },
    /// Bytes differ but the decoded tables are identical
    StructurallyIdentical,
    /// Bytes and decoded tables both differ
    StructurallyDifferent {
        /// First differing dump line (1-indexed)
        first_diff_line: Option<usize>,
        /// Unified diff, expected to actual
        diff: String,
    },
}

impl ComparisonOutcome {
    /// Returns true only for [`ComparisonOutcome::ByteIdentical`]
    pub fn is_pass(&self) -> bool {
        matches!(self, ComparisonOutcome::ByteIdentical)
    }

    /// Failure message for the report, `None` when the outcome passes
    pub fn failure_message(&self) -> Option<String> {
        let message = match self {
            ComparisonOutcome::ByteIdentical => return None,
            ComparisonOutcome::Unreadable { side, .. } => {
                format!("cannot read the {side} result")
            }
            ComparisonOutcome::DecoderUnavailable => {
                "hash for expected and actual does not match.".to_string()
            }
            ComparisonOutcome::DecodeFailed { side, .. } => {
                format!("ttx failed to parse the {side} result")
            }
            ComparisonOutcome::StructurallyIdentical => {
                "hash for expected and actual does not match, but the ttx matches. \
                 Expected file needs to be updated?"
                    .to_string()
            }
            ComparisonOutcome::StructurallyDifferent { .. } => {
                "ttx for expected and actual does not match.".to_string()
            }
        };
        Some(message)
    }

    /// Supporting detail printed ahead of the failure, if any
    pub fn detail(&self) -> Option<String> {
        match self {
            ComparisonOutcome::ByteIdentical | ComparisonOutcome::StructurallyIdentical => None,
            ComparisonOutcome::Unreadable { error, .. }
            | ComparisonOutcome::DecodeFailed { error, .. } => Some(error.clone()),
            ComparisonOutcome::DecoderUnavailable => {
                Some("fonttools is not present, skipping TTX diff; structural comparison skipped.".to_string())
            }
            ComparisonOutcome::StructurallyDifferent {
                first_diff_line,
                diff,
            } => {
                let mut detail = match first_diff_line {
                    Some(line) => format!("Line difference at line {line}\n"),
                    None => String::new(),
                };
                detail.push_str(diff);
                Some(detail)
            }
        }
    }
}

/// Byte-exact strategy: decides only when the files match
pub fn byte_exact(expected: &FontFile, actual: &FontFile) -> Option<ComparisonOutcome> {
    (expected.bytes == actual.bytes).then_some(ComparisonOutcome::ByteIdentical)
}

/// Structural strategy: explains a byte mismatch
pub fn structural<D>(decoder: &D, expected: &FontFile, actual: &FontFile) -> ComparisonOutcome
where
    D: StructuralDecoder + ?Sized,
{
    if !decoder.is_available() {
        return ComparisonOutcome::DecoderUnavailable;
    }

    let expected_dump = match decoder.decode(&expected.path) {
        Ok(dump) => dump,
        Err(err) => {
            return ComparisonOutcome::DecodeFailed {
                side: Side::Expected,
                error: err.to_string(),
            };
        }
    };
    let actual_dump = match decoder.decode(&actual.path) {
        Ok(dump) => dump,
        Err(err) => {
            return ComparisonOutcome::DecodeFailed {
                side: Side::Actual,
                error: err.to_string(),
            };
        }
    };

    if expected_dump == actual_dump {
        ComparisonOutcome::StructurallyIdentical
    } else {
        ComparisonOutcome::StructurallyDifferent {
            first_diff_line: find_first_diff_line(&expected_dump, &actual_dump),
            diff: unified_diff(&expected_dump, &actual_dump),
        }
    }
}

/// Find the line number of the first difference
fn find_first_diff_line(expected: &str, actual: &str) -> Option<usize> {
    let expected_lines: Vec<&str> = expected.lines().collect();
    let actual_lines: Vec<&str> = actual.lines().collect();

    for (i, (e, a)) in expected_lines.iter().zip(actual_lines.iter()).enumerate() {
        if e != a {
            return Some(i + 1); // 1-indexed
        }
    }

    if expected_lines.len() != actual_lines.len() {
        return Some(expected_lines.len().min(actual_lines.len()) + 1);
    }

    None
}

/// Generate unified diff format
pub fn unified_diff(expected: &str, actual: &str) -> String {
    let diff = TextDiff::from_lines(expected, actual);
    let mut result = String::new();

    result.push_str("--- expected\n");
    result.push_str("+++ actual\n");

    for hunk in diff.unified_diff().iter_hunks() {
        result.push_str(&format!("{}", hunk));
    }

    result
}

/// Runs the comparison strategies in order
pub struct EquivalenceChecker {
    decoder: Box<dyn StructuralDecoder>,
}

impl EquivalenceChecker {
    /// Create a checker around a structural decoder
    pub fn new(decoder: Box<dyn StructuralDecoder>) -> Self {
        Self { decoder }
    }

    /// Whether structural comparison can run
    pub fn has_decoder(&self) -> bool {
        self.decoder.is_available()
    }

    /// Compare the files at two paths
    pub fn compare(&self, expected: &Path, actual: &Path) -> ComparisonOutcome {
        let expected = match FontFile::load(expected) {
            Ok(file) => file,
            Err(err) => {
                return ComparisonOutcome::Unreadable {
                    side: Side::Expected,
                    error: format!("{}: {err}", expected.display()),
                };
            }
        };
        let actual = match FontFile::load(actual) {
            Ok(file) => file,
            Err(err) => {
                return ComparisonOutcome::Unreadable {
                    side: Side::Actual,
                    error: format!("{}: {err}", actual.display()),
                };
            }
        };
        self.compare_files(&expected, &actual)
    }

    /// Compare two fonts already in memory
    pub fn compare_files(&self, expected: &FontFile, actual: &FontFile) -> ComparisonOutcome {
        byte_exact(expected, actual)
            .unwrap_or_else(|| structural(self.decoder.as_ref(), expected, actual))
    }
}
