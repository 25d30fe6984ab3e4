//! Seams between the runner and its external collaborators
//!
//! The runner never talks to a process directly. It goes through these traits
//! so the subsetter, the structural decoder and the sanitizer can each be
//! replaced by a fake in tests, or be absent at run time.

use std::path::Path;

use super::batch::{BatchRequest, BatchResult};
use super::decoder::DecodeError;

/// A subsetting engine that answers one batch request at a time.
///
/// Implementations must never panic or abort on a bad response: a broken
/// engine is reported as [`BatchResult::Failure`].
pub trait SubsetEngine {
    /// Program name used when echoing requests into the report
    fn program(&self) -> String;

    /// Submit one request and block until its status line arrives
    fn submit(&mut self, request: &BatchRequest) -> BatchResult;

    /// Release the engine at the end of a run
    fn shutdown(&mut self) {}
}

/// Converts a font binary into a canonical textual representation.
pub trait StructuralDecoder {
    /// Whether the decoder can run in this environment
    fn is_available(&self) -> bool;

    /// Decode the font at `path` into its XML table dump
    fn decode(&self, path: &Path) -> Result<String, DecodeError>;
}

/// Outcome of running the sanitizer over a produced font
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The sanitizer accepted the file
    Accepted,
    /// The sanitizer rejected the file, with its report
    Rejected { report: String },
}

impl Validation {
    /// Returns true if the sanitizer accepted the file
    pub fn is_accepted(&self) -> bool {
        matches!(self, Validation::Accepted)
    }
}

/// External well-formedness checker for produced fonts.
pub trait Sanitizer {
    /// Whether a sanitizer binary was located
    fn is_available(&self) -> bool;

    /// Run the sanitizer over `path`
    fn validate(&self, path: &Path) -> Validation;
}

impl<T: SubsetEngine + ?Sized> SubsetEngine for Box<T> {
    fn program(&self) -> String {
        (**self).program()
    }

    fn submit(&mut self, request: &BatchRequest) -> BatchResult {
        (**self).submit(request)
    }

    fn shutdown(&mut self) {
        (**self).shutdown();
    }
}
