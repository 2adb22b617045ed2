//! Command line plus streaming configuration.

use std::time::Duration;

use crate::error::StreamError;

/// Idle timeout applied when none is configured explicitly.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// A shell command line and the idle timeout applied while streaming it.
///
/// Immutable once handed to [`ProcessStreamer::spawn`].
///
/// [`ProcessStreamer::spawn`]: crate::streamer::ProcessStreamer::spawn
#[derive(Debug, Clone)]
pub struct ShellCommand {
    code: String,
    timeout: Duration,
}

impl ShellCommand {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Maximum period without a new output line before iteration aborts.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn idle_timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve the program and argument vector used to run this command.
    ///
    /// Windows has no `-c` convention to lean on, so the line is split into
    /// an argument vector with shell quoting rules. Everywhere else the
    /// line goes verbatim to `$SHELL -c`, falling back to `/bin/bash`.
    pub(crate) fn resolve(&self) -> Result<(String, Vec<String>), StreamError> {
        if cfg!(windows) {
            let mut parts = shell_words::split(&self.code)?;
            if parts.is_empty() {
                return Err(StreamError::EmptyCommand);
            }
            let program = parts.remove(0);
            Ok((program, parts))
        } else {
            let shell =
                std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string());
            Ok((shell, vec!["-c".to_string(), self.code.clone()]))
        }
    }
}
