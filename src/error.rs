use std::time::Duration;

/// Errors raised while spawning or consuming a streamed shell command.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// No output line arrived within the configured idle window.
    #[error("no output for {0:?}, giving up on the process")]
    Timeout(Duration),

    #[error("failed to spawn `{command}`")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command line could not be tokenized (Windows only, where the
    /// line is split into an argument vector instead of going through a
    /// shell).
    #[error("invalid command line: {0}")]
    InvalidCommand(#[from] shell_words::ParseError),

    #[error("empty command line")]
    EmptyCommand,

    /// A child pipe was not available after spawn.
    #[error("failed to capture {0}")]
    StreamCapture(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// True for the idle-timeout failure, the one expected error mode
    /// callers commonly want to branch on.
    pub fn is_timeout(&self) -> bool {
        matches!(self, StreamError::Timeout(_))
    }
}
