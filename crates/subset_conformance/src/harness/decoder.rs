//! Structural font decoding through fontTools' `ttx`
//!
//! `ttx` dumps every table of a font as XML. Two dumps of semantically equal
//! fonts are textually equal even when their binary layout differs, which is
//! what the comparison fallback needs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

use super::traits::StructuralDecoder;

/// Program name searched on `PATH`
pub const TTX_PROGRAM: &str = "ttx";

/// Errors that can occur while decoding a font
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No decoder binary was configured or found
    #[error("structural decoder is not available")]
    Unavailable,

    /// The decoder could not be started
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The decoder rejected the font
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The dump could not be read back
    #[error("cannot read decoded output {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// [`StructuralDecoder`] backed by the `ttx` command-line tool
#[derive(Debug, Clone, Default)]
pub struct TtxDecoder {
    binary: Option<PathBuf>,
}

impl TtxDecoder {
    /// Use an explicit binary, or none
    pub fn with_binary(binary: Option<PathBuf>) -> Self {
        Self { binary }
    }

    /// A decoder that is never available
    pub fn disabled() -> Self {
        Self { binary: None }
    }

    /// The binary in use, if any
    pub fn binary(&self) -> Option<&Path> {
        self.binary.as_deref()
    }
}

impl StructuralDecoder for TtxDecoder {
    fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    fn decode(&self, path: &Path) -> Result<String, DecodeError> {
        let binary = self.binary.as_ref().ok_or(DecodeError::Unavailable)?;
        let program = binary.display().to_string();

        let scratch = tempfile::tempdir().map_err(|source| DecodeError::Output {
            path: "temporary directory".to_string(),
            source,
        })?;
        let dump = scratch.path().join("font.ttx");

        debug!(font = %path.display(), %program, "decoding font");
        let output = Command::new(binary)
            .arg("-q")
            .arg("-o")
            .arg(&dump)
            .arg(path)
            .env("LC_ALL", "C")
            .output()
            .map_err(|source| DecodeError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(DecodeError::Failed {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        fs::read_to_string(&dump).map_err(|source| DecodeError::Output {
            path: dump.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_decoder() {
        let decoder = TtxDecoder::disabled();
        assert!(!decoder.is_available());
        assert!(decoder.binary().is_none());
        assert!(matches!(
            decoder.decode(Path::new("font.ttf")),
            Err(DecodeError::Unavailable)
        ));
    }

    #[test]
    fn test_missing_binary_is_a_spawn_error() {
        let decoder = TtxDecoder::with_binary(Some(PathBuf::from("/nonexistent/bin/ttx")));
        assert!(decoder.is_available());
        let err = decoder.decode(Path::new("font.ttf")).unwrap_err();
        assert!(matches!(err, DecodeError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/bin/ttx"));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_a_decode_failure() {
        let Ok(falsy) = which::which("false") else {
            return;
        };
        let decoder = TtxDecoder::with_binary(Some(falsy));
        let err = decoder.decode(Path::new("font.ttf")).unwrap_err();
        assert!(matches!(err, DecodeError::Failed { .. }));
    }
}
