//! Subsetter Conformance Harness
//!
//! - [`BatchProcessClient`]: persistent engine process behind the batch protocol
//! - [`EquivalenceChecker`]: byte-exact comparison with a structural fallback
//! - [`OtsSanitizer`]: validation of byte-identical outputs
//! - [`TestRunner`]: runs each case in both variants and classifies it
//! - [`TapReporter`]: streaming TAP output
//! - [`TestSuite`]: suite files expanded into [`TestCase`]s

mod batch;
mod comparison;
mod config;
mod context;
mod decoder;
pub mod logging;
mod report;
mod runner;
mod suite;
mod traits;
mod validation;

#[cfg(test)]
mod test_support;

pub use batch::{
    BATCH_FLAG, BatchError, BatchProcessClient, BatchRequest, BatchResult, LaunchConfig,
    SUCCESS_TOKEN,
};
pub use comparison::{
    ComparisonOutcome, EquivalenceChecker, FontFile, Side, byte_exact, structural, unified_diff,
};
pub use config::{ConfigError, DEFAULT_RESPONSE_TIMEOUT, ENGINE_MARKER, HarnessConfig, ToolChoice};
pub use context::{RunContext, RunSummary, ScratchDir};
pub use decoder::{DecodeError, TTX_PROGRAM, TtxDecoder};
pub use report::{RunRecord, Subject, TAP_VERSION, TapReporter};
pub use runner::{FORCE_DROP_TABLES, FORCE_KEEP_TABLES, TestRunner, build_request};
pub use suite::{
    ALL_UNICODES, NO_UNICODES, SuiteError, SuiteResult, TestCase, TestSuite, read_profile_flags,
    unicodes_for_subset,
};
pub use traits::{Sanitizer, StructuralDecoder, SubsetEngine, Validation};
pub use validation::{OTS_PROGRAM, OtsSanitizer};
