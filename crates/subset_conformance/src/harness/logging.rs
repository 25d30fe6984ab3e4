//! Diagnostic logging setup
//!
//! Logs go to stderr through `tracing`; stdout belongs to the TAP stream.
//! `RUST_LOG` wins when set, otherwise the verbosity count picks the level.

use std::io;

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Level for a `-v` count: 0 warn, 1 info, 2 debug, 3+ trace
pub fn default_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Filter honoring `RUST_LOG`, falling back to the verbosity level
pub fn filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbosity).as_str().to_lowercase()))
}

/// Install the global subscriber; a second call is a no-op
pub fn init(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbosity))
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(default_level(0), Level::WARN);
        assert_eq!(default_level(1), Level::INFO);
        assert_eq!(default_level(2), Level::DEBUG);
        assert_eq!(default_level(3), Level::TRACE);
        assert_eq!(default_level(200), Level::TRACE);
    }

    #[test]
    fn test_init_is_idempotent() {
        init(0);
        init(2);
        tracing::warn!("logging initialised twice");
    }
}
