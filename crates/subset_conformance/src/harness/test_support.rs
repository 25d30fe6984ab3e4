//! In-process fakes for the external tools

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use super::batch::{BatchRequest, BatchResult};
use super::decoder::DecodeError;
use super::traits::{Sanitizer, StructuralDecoder, SubsetEngine, Validation};

/// Shared in-memory sink for reporter output
#[derive(Clone, Default)]
pub struct TestBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl TestBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_string(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }
}

impl Write for TestBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn file_key(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Decoder answering from canned dumps keyed by file name
///
/// Files without a canned dump decode to their own contents, or to an empty
/// dump when they do not exist.
pub struct FakeDecoder {
    available: bool,
    panics: bool,
    dumps: HashMap<String, String>,
    failures: HashMap<String, String>,
}

impl FakeDecoder {
    pub fn new() -> Self {
        Self {
            available: true,
            panics: false,
            dumps: HashMap::new(),
            failures: HashMap::new(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Available, but any decode call is a test bug
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::new()
        }
    }

    pub fn with_dump(mut self, file_name: &str, dump: &str) -> Self {
        self.dumps.insert(file_name.to_string(), dump.to_string());
        self
    }

    pub fn failing_on(mut self, file_name: &str, stderr: &str) -> Self {
        self.failures
            .insert(file_name.to_string(), stderr.to_string());
        self
    }
}

impl StructuralDecoder for FakeDecoder {
    fn is_available(&self) -> bool {
        self.available
    }

    fn decode(&self, path: &Path) -> Result<String, DecodeError> {
        assert!(!self.panics, "decode called for {}", path.display());
        if !self.available {
            return Err(DecodeError::Unavailable);
        }

        let key = file_key(path);
        if let Some(stderr) = self.failures.get(&key) {
            return Err(DecodeError::Failed {
                program: "fake-ttx".to_string(),
                status: "exit status: 1".to_string(),
                stderr: stderr.clone(),
            });
        }
        if let Some(dump) = self.dumps.get(&key) {
            return Ok(dump.clone());
        }
        Ok(fs::read(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default())
    }
}

/// Sanitizer with a fixed verdict
pub struct FakeSanitizer {
    available: bool,
    verdict: Validation,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeSanitizer {
    pub fn accepting() -> Self {
        Self {
            available: true,
            verdict: Validation::Accepted,
            calls: Arc::default(),
        }
    }

    pub fn rejecting(report: &str) -> Self {
        Self {
            verdict: Validation::Rejected {
                report: report.to_string(),
            },
            ..Self::accepting()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::accepting()
        }
    }

    /// File names validated so far, shared with clones of the handle
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

impl Sanitizer for FakeSanitizer {
    fn is_available(&self) -> bool {
        self.available
    }

    fn validate(&self, path: &Path) -> Validation {
        self.calls.lock().push(file_key(path));
        self.verdict.clone()
    }
}

/// Engine that "subsets" by copying the source font to the output path
///
/// Requests whose arguments contain a configured marker are answered with a
/// failure, and so is every request once [`CopyEngine::broken`] is set.
pub struct CopyEngine {
    fail_marker: Option<String>,
    broken: bool,
    requests: Arc<Mutex<Vec<BatchRequest>>>,
    shutdowns: Arc<Mutex<usize>>,
}

impl CopyEngine {
    pub fn new() -> Self {
        Self {
            fail_marker: None,
            broken: false,
            requests: Arc::default(),
            shutdowns: Arc::default(),
        }
    }

    pub fn failing_when(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::new()
        }
    }

    /// Requests seen so far, shared with clones of the handle
    pub fn requests(&self) -> Arc<Mutex<Vec<BatchRequest>>> {
        Arc::clone(&self.requests)
    }

    /// Number of shutdown calls, shared with clones of the handle
    pub fn shutdowns(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.shutdowns)
    }

    fn value<'a>(request: &'a BatchRequest, flag: &str) -> Option<&'a str> {
        request
            .args()
            .iter()
            .find_map(|arg| arg.strip_prefix(flag))
    }
}

impl SubsetEngine for CopyEngine {
    fn program(&self) -> String {
        "hb-subset".to_string()
    }

    fn submit(&mut self, request: &BatchRequest) -> BatchResult {
        self.requests.lock().push(request.clone());

        let marked = self
            .fail_marker
            .as_ref()
            .is_some_and(|marker| request.args().iter().any(|arg| arg.contains(marker)));
        if self.broken || marked {
            return BatchResult::Failure {
                reason: "engine answered: error".to_string(),
            };
        }

        let (Some(font), Some(output)) = (
            Self::value(request, "--font-file="),
            Self::value(request, "--output-file="),
        ) else {
            return BatchResult::Failure {
                reason: "missing font or output argument".to_string(),
            };
        };
        match fs::copy(font, output) {
            Ok(_) => BatchResult::Success,
            Err(err) => BatchResult::Failure {
                reason: err.to_string(),
            },
        }
    }

    fn shutdown(&mut self) {
        *self.shutdowns.lock() += 1;
    }
}

/// Engine replaying a fixed sequence of verdicts without touching the disk
pub struct ScriptedEngine {
    verdicts: Vec<bool>,
    next: usize,
}

impl ScriptedEngine {
    pub fn new(verdicts: Vec<bool>) -> Self {
        Self { verdicts, next: 0 }
    }
}

impl SubsetEngine for ScriptedEngine {
    fn program(&self) -> String {
        "scripted".to_string()
    }

    fn submit(&mut self, _request: &BatchRequest) -> BatchResult {
        let ok = self.verdicts.get(self.next).copied().unwrap_or(false);
        self.next += 1;
        if ok {
            BatchResult::Success
        } else {
            BatchResult::Failure {
                reason: "scripted failure".to_string(),
            }
        }
    }
}
