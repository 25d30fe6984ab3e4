//! RunContext - Bookkeeping shared by every test of a run
//!
//! Hands out test numbers, counts failures and owns the scratch directory the
//! engine writes into. The scratch directory survives a failing run so the
//! produced fonts can be inspected; a clean run removes it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

const SCRATCH_PREFIX: &str = "subset-conformance-";

/// Directory that receives the engine's outputs
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create a fresh, uniquely named directory under the system temp dir
    pub fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?;
        Ok(Self { path: dir.keep() })
    }

    /// Use an existing directory, creating it if needed
    pub fn at(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the directory and everything in it
    pub fn remove(self) -> io::Result<()> {
        fs::remove_dir_all(&self.path)
    }
}

/// Totals of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub failures: usize,
    /// Scratch directory kept for inspection, if any test failed
    pub retained: Option<PathBuf>,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.failures == 0
    }
}

/// Mutable state of a run in progress
#[derive(Debug)]
pub struct RunContext {
    scratch: ScratchDir,
    total: usize,
    failures: usize,
}

impl RunContext {
    pub fn new(scratch: ScratchDir) -> Self {
        Self {
            scratch,
            total: 0,
            failures: 0,
        }
    }

    /// Allocate the next test number, starting at 1
    pub fn begin_test(&mut self) -> usize {
        self.total += 1;
        self.total
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn scratch(&self) -> &Path {
        self.scratch.path()
    }

    /// Close the run, removing the scratch directory when nothing failed
    pub fn finish(self) -> RunSummary {
        let retained = if self.failures == 0 {
            let path = self.scratch.path().to_path_buf();
            match self.scratch.remove() {
                Ok(()) => debug!(path = %path.display(), "removed scratch directory"),
                Err(err) => warn!(path = %path.display(), error = %err, "cannot remove scratch directory"),
            }
            None
        } else {
            Some(self.scratch.path().to_path_buf())
        };

        RunSummary {
            total: self.total,
            failures: self.failures,
            retained,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_are_sequential() {
        let mut ctx = RunContext::new(ScratchDir::create().unwrap());
        assert_eq!(ctx.begin_test(), 1);
        assert_eq!(ctx.begin_test(), 2);
        assert_eq!(ctx.begin_test(), 3);
        assert_eq!(ctx.total(), 3);
        ctx.finish();
    }

    #[test]
    fn test_clean_run_removes_scratch() {
        let mut ctx = RunContext::new(ScratchDir::create().unwrap());
        let scratch = ctx.scratch().to_path_buf();
        fs::write(scratch.join("out.ttf"), b"font").unwrap();
        ctx.begin_test();

        let summary = ctx.finish();
        assert!(summary.all_passed());
        assert_eq!(summary.retained, None);
        assert!(!scratch.exists());
    }

    #[test]
    fn test_failing_run_keeps_scratch() {
        let mut ctx = RunContext::new(ScratchDir::create().unwrap());
        let scratch = ctx.scratch().to_path_buf();
        ctx.begin_test();
        ctx.record_failure();

        let summary = ctx.finish();
        assert!(!summary.all_passed());
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.retained.as_deref(), Some(scratch.as_path()));
        assert!(scratch.is_dir());
        fs::remove_dir_all(scratch).unwrap();
    }

    #[test]
    fn test_scratch_at_creates_directory() {
        let parent = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::at(parent.path().join("nested/out")).unwrap();
        assert!(scratch.path().is_dir());
        assert!(
            scratch
                .path()
                .file_name()
                .is_some_and(|name| name == "out")
        );
    }

    #[test]
    fn test_scratch_prefix() {
        let scratch = ScratchDir::create().unwrap();
        let name = scratch.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(SCRATCH_PREFIX));
        scratch.remove().unwrap();
    }
}
