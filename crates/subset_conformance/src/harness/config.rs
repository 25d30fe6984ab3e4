//! Harness configuration, independent of argument parsing
//!
//! The binary fills a [`HarnessConfig`] from its command line and environment;
//! validation happens here so it can be tested without spawning anything.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use super::batch::LaunchConfig;
use super::decoder::{TTX_PROGRAM, TtxDecoder};
use super::validation::{OTS_PROGRAM, OtsSanitizer};

/// Substring the engine's file name must contain
pub const ENGINE_MARKER: &str = "hb-subset";

/// Default bound on one batch response
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors in the harness configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The engine argument is missing, does not exist, or is not hb-subset
    #[error("First argument does not seem to point to usable hb-subset.")]
    UnusableEngine,

    /// No suite files were given
    #[error("No tests supplied.")]
    NoSuites,
}

/// How an optional external tool is found
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolChoice {
    /// Never use the tool
    Disabled,
    /// Use this binary
    Explicit(PathBuf),
    /// Look the program up on `PATH`
    #[default]
    Search,
}

impl ToolChoice {
    /// Resolve to a binary path, if any
    pub fn resolve(&self, program: &str) -> Option<PathBuf> {
        match self {
            ToolChoice::Disabled => None,
            ToolChoice::Explicit(path) => Some(path.clone()),
            ToolChoice::Search => which::which(program).ok(),
        }
    }
}

/// Validated settings for one harness run
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    engine: PathBuf,
    suites: Vec<PathBuf>,
    exe_wrapper: Option<String>,
    response_timeout: Option<Duration>,
    ttx: ToolChoice,
    sanitizer: ToolChoice,
}

impl HarnessConfig {
    /// Validate the engine and suite arguments
    ///
    /// The engine must exist and its file name must contain `hb-subset`.
    /// At least one suite is required.
    pub fn new(engine: Option<PathBuf>, suites: Vec<PathBuf>) -> Result<Self, ConfigError> {
        let engine = engine
            .filter(|path| is_usable_engine(path))
            .ok_or(ConfigError::UnusableEngine)?;
        if suites.is_empty() {
            return Err(ConfigError::NoSuites);
        }
        Ok(Self {
            engine,
            suites,
            exe_wrapper: None,
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT),
            ttx: ToolChoice::Search,
            sanitizer: ToolChoice::Search,
        })
    }

    /// Prefix the engine launch with a wrapper command; blank means none
    pub fn with_exe_wrapper(mut self, wrapper: Option<String>) -> Self {
        self.exe_wrapper = wrapper.filter(|w| !w.trim().is_empty());
        self
    }

    /// Bound the wait for each response; `None` waits forever
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_ttx(mut self, ttx: ToolChoice) -> Self {
        self.ttx = ttx;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: ToolChoice) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn engine(&self) -> &Path {
        &self.engine
    }

    pub fn suites(&self) -> &[PathBuf] {
        &self.suites
    }

    pub fn exe_wrapper(&self) -> Option<&str> {
        self.exe_wrapper.as_deref()
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout
    }

    /// Launch settings for the batch engine
    pub fn launch_config(&self) -> LaunchConfig {
        LaunchConfig::new(&self.engine)
            .with_wrapper(self.exe_wrapper.clone())
            .with_response_timeout(self.response_timeout)
    }

    /// Structural decoder as configured
    pub fn decoder(&self) -> TtxDecoder {
        TtxDecoder::with_binary(self.ttx.resolve(TTX_PROGRAM))
    }

    /// Sanitizer as configured
    pub fn sanitizer(&self) -> OtsSanitizer {
        OtsSanitizer::with_binary(self.sanitizer.resolve(OTS_PROGRAM))
    }
}

fn is_usable_engine(path: &Path) -> bool {
    path.exists()
        && path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().contains(ENGINE_MARKER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn engine_in(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "").unwrap();
        path
    }

    #[test]
    fn test_missing_engine() {
        assert_eq!(
            HarnessConfig::new(None, vec![PathBuf::from("a.tests")]).unwrap_err(),
            ConfigError::UnusableEngine
        );
    }

    #[test]
    fn test_nonexistent_engine() {
        let err = HarnessConfig::new(
            Some(PathBuf::from("/nonexistent/hb-subset")),
            vec![PathBuf::from("a.tests")],
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::UnusableEngine);
        assert_eq!(
            err.to_string(),
            "First argument does not seem to point to usable hb-subset."
        );
    }

    #[test]
    fn test_engine_name_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path(), "pyftsubset");
        assert_eq!(
            HarnessConfig::new(Some(engine), vec![PathBuf::from("a.tests")]).unwrap_err(),
            ConfigError::UnusableEngine
        );
    }

    #[test]
    fn test_no_suites() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path(), "hb-subset");
        let err = HarnessConfig::new(Some(engine), Vec::new()).unwrap_err();
        assert_eq!(err, ConfigError::NoSuites);
        assert_eq!(err.to_string(), "No tests supplied.");
    }

    #[test]
    fn test_defaults_and_launch_config() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path(), "hb-subset.exe");
        let config = HarnessConfig::new(Some(engine.clone()), vec![PathBuf::from("a.tests")])
            .unwrap()
            .with_exe_wrapper(Some("  ".to_string()));

        assert_eq!(config.engine(), engine);
        assert_eq!(config.suites(), [PathBuf::from("a.tests")]);
        assert_eq!(config.exe_wrapper(), None);
        assert_eq!(config.response_timeout(), Some(DEFAULT_RESPONSE_TIMEOUT));
        assert_eq!(
            config.launch_config().command_line(),
            format!("{} --batch", engine.display())
        );
    }

    #[test]
    fn test_wrapper_prefixes_launch() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path(), "hb-subset");
        let config = HarnessConfig::new(Some(engine.clone()), vec![PathBuf::from("a.tests")])
            .unwrap()
            .with_exe_wrapper(Some("qemu-aarch64 -L /usr/aarch64".to_string()));
        let launch = config.launch_config();
        assert_eq!(launch.wrapper, ["qemu-aarch64", "-L", "/usr/aarch64"]);
        assert_eq!(
            launch.command_line(),
            format!("qemu-aarch64 -L /usr/aarch64 {} --batch", engine.display())
        );
    }

    #[test]
    fn test_tool_choices() {
        assert_eq!(ToolChoice::Disabled.resolve("sh"), None);
        assert_eq!(
            ToolChoice::Explicit(PathBuf::from("/opt/ttx")).resolve("ttx"),
            Some(PathBuf::from("/opt/ttx"))
        );
        assert_eq!(
            ToolChoice::Search.resolve("definitely-not-a-real-program-xyz"),
            None
        );

        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path(), "hb-subset");
        let config = HarnessConfig::new(Some(engine), vec![PathBuf::from("a.tests")])
            .unwrap()
            .with_ttx(ToolChoice::Disabled)
            .with_sanitizer(ToolChoice::Explicit(PathBuf::from("/opt/ots-sanitize")));
        assert!(config.decoder().binary().is_none());
        assert_eq!(
            config.sanitizer().binary(),
            Some(Path::new("/opt/ots-sanitize"))
        );
    }
}
