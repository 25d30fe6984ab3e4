#![allow(clippy::all)]
#![allow(clippy::nursery)]
#![allow(clippy::pedantic)]
#![allow(clippy::style)]
//! Conformance Testing Harness for hb-subset
//!
//! Drives a font subsetting engine through a suite of recorded scenarios and
//! checks that every produced font is byte-for-byte identical to the
//! recording.
//!
//! ## Architecture
//!
//! The harness provides:
//! - **BatchProcessClient**: one long-lived engine process fed over a
//!   line-based request/response protocol
//! - **EquivalenceChecker**: byte comparison, then a `ttx` dump diff that
//!   explains mismatches
//! - **OtsSanitizer**: well-formedness check of byte-identical results
//! - **TestRunner**: runs every case plainly and with `--preprocess`
//! - **TapReporter**: streaming TAP version 14 output
//!
//! ## Usage
//!
//! ```rust,ignore
//! use subset_conformance::prelude::*;
//!
//! let config = HarnessConfig::new(Some("build/util/hb-subset".into()), suites)?;
//! let engine = BatchProcessClient::start(config.launch_config())?;
//! let mut runner = TestRunner::new(
//!     engine,
//!     EquivalenceChecker::new(Box::new(config.decoder())),
//!     Box::new(config.sanitizer()),
//!     TapReporter::stdout(),
//!     ScratchDir::create()?,
//! );
//! let check = runner.start();
//! for suite in config.suites() {
//!     runner.run_suite_file(suite, check);
//! }
//! let summary = runner.finish();
//! ```

#![forbid(unsafe_code)]

pub mod harness;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::harness::{
        BatchProcessClient, BatchRequest, BatchResult, ComparisonOutcome, ConfigError,
        EquivalenceChecker, HarnessConfig, LaunchConfig, OtsSanitizer, RunSummary, Sanitizer,
        ScratchDir, StructuralDecoder, SubsetEngine, TapReporter, TestCase, TestRunner, TestSuite,
        ToolChoice, TtxDecoder, Validation,
    };
}
