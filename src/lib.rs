//! # shellstream
//!
//! Run a shell command and consume its interleaved stdout/stderr as an
//! asynchronous sequence of cleaned text lines.
//!
//! Two pump tasks drain the child's output streams into a bounded queue;
//! the consumer polls that queue with an idle timeout, and the child is
//! killed when the streamer goes out of scope. Lines are sanitized for
//! display in a markdown context: ANSI escapes stripped, carriage returns
//! removed, double backticks defused with a zero-width space. stderr
//! lines carry a literal `[stderr] ` prefix.
//!
//! ```no_run
//! use shellstream::{ProcessStreamer, ShellCommand};
//!
//! # async fn demo() -> Result<(), shellstream::StreamError> {
//! let mut shell = ProcessStreamer::spawn(ShellCommand::new("echo hello"))?;
//! while let Some(line) = shell.next_line().await? {
//!     println!("{line}");
//! }
//! shell.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - `command` - Command line plus idle-timeout configuration
//! - `clean` - The line cleaning transform
//! - `streamer` - Process lifecycle, pump tasks, and line iteration
//! - `error` - Error taxonomy for spawning and streaming

pub mod clean;
pub mod command;
pub mod error;
pub mod streamer;

pub use command::{ShellCommand, DEFAULT_TIMEOUT};
pub use error::StreamError;
pub use streamer::ProcessStreamer;
