//! TestRunner - Driving test cases through the engine
//!
//! For every case the runner:
//! - builds a batch request and echoes it as a TAP comment
//! - submits it to the engine
//! - compares the produced font with the recorded one
//! - optionally sanitizes a byte-identical result
//! - emits exactly one numbered result line
//!
//! Each case runs twice, once plainly and once with `--preprocess`.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::batch::{BatchRequest, BatchResult};
use super::comparison::EquivalenceChecker;
use super::context::{RunContext, RunSummary, ScratchDir};
use super::report::{RunRecord, Subject, TapReporter};
use super::suite::{SuiteError, TestCase, TestSuite};
use super::traits::{Sanitizer, SubsetEngine, Validation};

/// Tables every request drops
pub const FORCE_DROP_TABLES: &str = "DSIG,BASE";

/// Tables every request keeps, whatever the profile says
pub const FORCE_KEEP_TABLES: &str = "sbix";

/// Build the batch request for one variant of a case
pub fn build_request(case: &TestCase, output: &Path, preprocess: bool) -> BatchRequest {
    let mut request = BatchRequest::new()
        .arg(format!("--font-file={}", case.font_path().display()))
        .arg(format!("--output-file={}", output.display()))
        .arg(format!("--unicodes={}", case.unicodes()))
        .arg(format!("--drop-tables+={FORCE_DROP_TABLES}"))
        .arg(format!("--drop-tables-={FORCE_KEEP_TABLES}"));
    if preprocess {
        request.push("--preprocess");
    }
    request.extend(case.profile_flags().iter().cloned());
    if !case.instance_flags().is_empty() {
        request.push(format!("--instance={}", case.instance_flags().join(",")));
    }
    if case.optimize() {
        request.push("--optimize");
    }
    request
}

/// Runs cases against one engine and reports every invocation
pub struct TestRunner<E: SubsetEngine> {
    engine: E,
    checker: EquivalenceChecker,
    sanitizer: Box<dyn Sanitizer>,
    reporter: TapReporter,
    context: RunContext,
    seen_names: HashSet<String>,
}

impl<E: SubsetEngine> TestRunner<E> {
    pub fn new(
        engine: E,
        checker: EquivalenceChecker,
        sanitizer: Box<dyn Sanitizer>,
        reporter: TapReporter,
        scratch: ScratchDir,
    ) -> Self {
        Self {
            engine,
            checker,
            sanitizer,
            reporter,
            context: RunContext::new(scratch),
            seen_names: HashSet::new(),
        }
    }

    /// Write the report header; returns whether outputs get sanitized
    pub fn start(&mut self) -> bool {
        self.reporter.header();
        let check_validation = self.sanitizer.is_available();
        if !check_validation {
            self.reporter
                .comment("OTS is not present, skipping all ots checks.");
        }
        if !self.checker.has_decoder() {
            warn!("structural decoder not found; byte mismatches will not be diffed");
        }
        check_validation
    }

    /// Run state so far
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Run one variant of a case; returns true when it passed
    pub fn run(&mut self, case: &TestCase, check_validation: bool, preprocess: bool) -> bool {
        let number = self.context.begin_test();
        let actual = self.context.scratch().join(case.output_file_name(preprocess));
        debug!(number, case = %case, preprocess, "running test");

        // A leftover output must never be mistaken for this run's result.
        if let Err(err) = fs::remove_file(&actual) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %actual.display(), error = %err, "cannot remove stale output");
            }
        }

        let request = build_request(case, &actual, preprocess);
        self.reporter
            .comment(&format!("{} {}", self.engine.program(), request));

        let mut record = RunRecord::new(
            number,
            case.description(preprocess),
            Subject::Case {
                font_path: case.font_path().to_path_buf(),
                profile_path: case.profile_path().to_path_buf(),
                unicodes: case.unicodes().to_string(),
                expected_path: case.expected_path().to_path_buf(),
                actual_path: actual.clone(),
            },
        );

        match self.engine.submit(&request) {
            BatchResult::Failure { reason } => {
                self.reporter.comment(&reason);
                record.fail(format!("{request} failed"));
            }
            BatchResult::Success => {
                self.check_output(case, &actual, check_validation, &mut record);
            }
        }

        if !record.passed {
            self.context.record_failure();
        }
        self.reporter.record(&record);
        record.passed
    }

    fn check_output(
        &mut self,
        case: &TestCase,
        actual: &Path,
        check_validation: bool,
        record: &mut RunRecord,
    ) {
        let outcome = self.checker.compare(case.expected_path(), actual);
        if !outcome.is_pass() {
            if let Some(detail) = outcome.detail() {
                self.reporter.comment(&detail);
            }
            record.fail(outcome.failure_message().unwrap_or_default());
            return;
        }

        if !check_validation || !self.sanitizer.is_available() {
            return;
        }
        self.reporter.comment("Checking output with ots-sanitize.");
        if let Validation::Rejected { report } = self.sanitizer.validate(actual) {
            self.reporter.comment(&format!("OTS Failure: {report}"));
            record.fail("ots for subsetted file fails.");
        }
    }

    /// Run both variants of a case; returns (plain, preprocess) verdicts
    pub fn run_case(&mut self, case: &TestCase, check_validation: bool) -> (bool, bool) {
        // Outputs are named after the display name, so a repeat overwrites.
        if !self.seen_names.insert(case.display_name().to_string()) {
            warn!(case = %case, "display name repeats within the run");
            self.reporter.comment(&format!(
                "{case}: display name already used in this run; outputs overwrite each other"
            ));
        }
        let plain = self.run(case, check_validation, false);
        let preprocessed = self.run(case, check_validation, true);
        if plain != preprocessed {
            warn!(case = %case, plain, preprocessed, "preprocess changes the outcome");
            self.reporter.comment(&format!(
                "{case}: preprocess variant {} while the plain run {}",
                verdict(preprocessed),
                verdict(plain)
            ));
        }
        (plain, preprocessed)
    }

    /// Run every case of a loaded suite
    pub fn run_suite(&mut self, suite: &TestSuite, check_validation: bool) {
        self.reporter
            .comment(&format!("Running tests in {}", suite.path().display()));
        match suite.cases() {
            Ok(cases) => {
                debug!(suite = %suite.path().display(), cases = cases.len(), "suite expanded");
                for case in &cases {
                    self.run_case(case, check_validation);
                }
            }
            Err(err) => self.report_suite_error(suite.path(), &err),
        }
    }

    /// Load and run a suite file; a broken suite counts as one failure
    pub fn run_suite_file(&mut self, path: &Path, check_validation: bool) {
        match TestSuite::load(path) {
            Ok(suite) => self.run_suite(&suite, check_validation),
            Err(err) => {
                self.reporter
                    .comment(&format!("Running tests in {}", path.display()));
                self.report_suite_error(path, &err);
            }
        }
    }

    fn report_suite_error(&mut self, path: &Path, err: &SuiteError) {
        warn!(suite = %path.display(), error = %err, "cannot load suite");
        let number = self.context.begin_test();
        let description = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let mut record = RunRecord::new(
            number,
            description,
            Subject::Suite {
                path: PathBuf::from(path),
            },
        );
        record.fail(err.to_string());
        self.context.record_failure();
        self.reporter.record(&record);
    }

    /// Stop the engine and write the summary and plan
    pub fn finish(self) -> RunSummary {
        let Self {
            mut engine,
            mut reporter,
            context,
            ..
        } = self;
        engine.shutdown();

        let summary = context.finish();
        reporter.summary(summary.failures, summary.retained.as_deref());
        reporter.plan();
        summary
    }
}

fn verdict(passed: bool) -> &'static str {
    if passed { "passed" } else { "failed" }
}
