//! ReportEmitter - Streaming TAP output
//!
//! Every line is flushed as soon as it is written so CI consumers see results
//! while the run is in progress:
//!
//! ```text
//! TAP version 14
//! # Running tests in data/tests/basics.tests
//! ok 1 - Roboto-Regular.abc.default.61.ttf
//! not ok 2 - Roboto-Regular.abc.default.61.ttf (preprocess)
//!   ---
//!   message: "ttx for expected and actual does not match."
//!   ...
//! # 1 test(s) failed; output left in /tmp/subset-conformance-x1y2
//! 1..2
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// First line of every report
pub const TAP_VERSION: &str = "TAP version 14";

/// What a run record is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// One variant of one test case
    Case {
        font_path: PathBuf,
        profile_path: PathBuf,
        unicodes: String,
        expected_path: PathBuf,
        actual_path: PathBuf,
    },
    /// A suite file that could not be expanded into cases
    Suite { path: PathBuf },
}

/// Bookkeeping for one numbered invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    /// Sequential test number, starting at 1
    pub number: usize,
    /// Text after the `-` on the result line
    pub description: String,
    /// Whether the invocation passed
    pub passed: bool,
    /// Failure message, unset for passing records
    pub message: Option<String>,
    /// Files involved
    pub subject: Subject,
}

impl RunRecord {
    /// Start a record; it passes until [`RunRecord::fail`] is called
    pub fn new(number: usize, description: impl Into<String>, subject: Subject) -> Self {
        Self {
            number,
            description: description.into(),
            passed: true,
            message: None,
            subject,
        }
    }

    /// Mark the record failed with a message
    pub fn fail(&mut self, message: impl Into<String>) {
        self.passed = false;
        self.message = Some(message.into());
    }

    fn diagnostic_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        if let Some(message) = &self.message {
            fields.push(("message", message.clone()));
        }
        match &self.subject {
            Subject::Case {
                font_path,
                profile_path,
                unicodes,
                expected_path,
                actual_path,
            } => {
                fields.push(("test.font_path", absolute(font_path)));
                fields.push(("test.profile_path", absolute(profile_path)));
                fields.push(("test.unicodes", unicodes.clone()));
                fields.push(("expected_file", absolute(expected_path)));
                fields.push(("actual_file", absolute(actual_path)));
            }
            Subject::Suite { path } => {
                fields.push(("suite_path", absolute(path)));
            }
        }
        fields
    }
}

fn absolute(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// Quote a value as a YAML double-quoted scalar
fn yaml_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Writer for the TAP stream
pub struct TapReporter {
    output: Box<dyn Write + Send>,
    emitted: usize,
}

impl TapReporter {
    /// Report to stdout
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Report to a custom destination
    pub fn new<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            output: Box::new(output),
            emitted: 0,
        }
    }

    /// Number of ok / not ok lines written so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.output, "{text}");
        let _ = self.output.flush();
    }

    /// Write the version header
    pub fn header(&mut self) {
        self.line(TAP_VERSION);
    }

    /// Write a `#` comment; multi-line text becomes one comment per line
    pub fn comment(&mut self, text: &str) {
        if text.is_empty() {
            self.line("#");
            return;
        }
        for line in text.lines() {
            if line.is_empty() {
                self.line("#");
            } else {
                self.line(&format!("# {line}"));
            }
        }
    }

    /// Write the result line for a record, plus its diagnostic block on failure
    pub fn record(&mut self, record: &RunRecord) {
        debug_assert_eq!(
            record.number,
            self.emitted + 1,
            "test numbers must be contiguous"
        );
        self.emitted += 1;

        let status = if record.passed { "ok" } else { "not ok" };
        self.line(&format!(
            "{status} {} - {}",
            record.number, record.description
        ));

        if !record.passed {
            self.line("  ---");
            for (key, value) in record.diagnostic_fields() {
                self.line(&format!("  {key}: {}", yaml_quote(&value)));
            }
            self.line("  ...");
        }
    }

    /// Write the trailing summary comment
    pub fn summary(&mut self, failures: usize, retained: Option<&Path>) {
        if failures == 0 {
            self.comment("All tests passed.");
        } else {
            let location = retained
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<removed>".to_string());
            self.comment(&format!(
                "{failures} test(s) failed; output left in {location}"
            ));
        }
    }

    /// Write the plan line; its count equals the number of result lines
    pub fn plan(&mut self) {
        let plan = format!("1..{}", self.emitted);
        self.line(&plan);
    }
}
