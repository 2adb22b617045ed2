//! Child process lifecycle, pump tasks, and line iteration.
//!
//! Two tokio tasks (one per output stream) perform the reads off the
//! consumer's path and push cleaned lines into a bounded queue. The
//! consumer polls that queue in one-second steps, giving up once the
//! idle window elapses with no new line. The channel closing after both
//! pumps finish is the exhaustion signal, so a drained queue plus a dead
//! process ends iteration cleanly.

use std::process::Stdio;
use std::time::{Duration, Instant};

use futures::stream::Stream;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, warn};

use crate::clean::clean_line;
use crate::command::ShellCommand;
use crate::error::StreamError;

/// Pending lines held between the pump tasks and the consumer. Producers
/// suspend while the queue is full; nothing is dropped.
const QUEUE_CAPACITY: usize = 250;

/// Granularity of the idle-timeout check.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Grace period for reaping the child after a kill.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// Marker prepended to stderr lines before cleaning.
const STDERR_TAG: &str = "[stderr] ";

/// Streams one child process's stdout/stderr as cleaned text lines.
///
/// Finite and not restartable: once iteration is exhausted or fails,
/// spawn a new streamer. Dropping the streamer kills the child
/// (`kill_on_drop`), so early breaks and error paths never leak a
/// process.
pub struct ProcessStreamer {
    child: Child,
    rx: mpsc::Receiver<String>,
    idle_timeout: Duration,
    last_line: Instant,
    exit_code: Option<Option<i32>>,
}

impl ProcessStreamer {
    /// Spawn the command and start both pump tasks.
    ///
    /// stdin is not attached; stdout and stderr are captured as pipes.
    pub fn spawn(command: ShellCommand) -> Result<Self, StreamError> {
        let (program, args) = command.resolve()?;
        debug!("spawning `{}` via {}", command.code(), program);

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StreamError::SpawnFailed {
                command: command.code().to_string(),
                source: e,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or(StreamError::StreamCapture("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(StreamError::StreamCapture("stderr"))?;

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let stderr_tx = tx.clone();
        tokio::spawn(pump(stdout, tx, "stdout", ""));
        tokio::spawn(pump(stderr, stderr_tx, "stderr", STDERR_TAG));

        Ok(Self {
            child,
            rx,
            idle_timeout: command.idle_timeout(),
            last_line: Instant::now(),
            exit_code: None,
        })
    }

    /// Wait for the next cleaned line.
    ///
    /// Returns `Ok(None)` once both output streams have closed and the
    /// queue is drained. The idle timer resets on every successful
    /// dequeue, so a process that keeps producing can run past the
    /// timeout; only silence aborts it.
    pub async fn next_line(&mut self) -> Result<Option<String>, StreamError> {
        loop {
            match time::timeout(POLL_INTERVAL, self.rx.recv()).await {
                Ok(Some(line)) => {
                    self.last_line = Instant::now();
                    return Ok(Some(line));
                }
                // Both pump tasks finished and the queue drained.
                Ok(None) => return Ok(None),
                Err(_) => {
                    if self.last_line.elapsed() >= self.idle_timeout {
                        warn!("no output for {:?}, aborting stream", self.idle_timeout);
                        return Err(StreamError::Timeout(self.idle_timeout));
                    }
                }
            }
        }
    }

    /// Kill the child and reap its exit code.
    ///
    /// Idempotent: calling it again, or after the process has already
    /// exited, returns the recorded code. `None` means the child was
    /// terminated by signal or did not exit within the grace window
    /// (in which case `kill_on_drop` finishes the job).
    pub async fn shutdown(&mut self) -> Result<Option<i32>, StreamError> {
        if let Some(code) = self.exit_code {
            return Ok(code);
        }

        // start_kill fails if the child already exited; that is fine,
        // wait() below still reaps the status.
        let _ = self.child.start_kill();

        match time::timeout(KILL_GRACE, self.child.wait()).await {
            Ok(status) => {
                let code = status?.code();
                debug!("child exited with {:?}", code);
                self.exit_code = Some(code);
                Ok(code)
            }
            Err(_) => {
                warn!("child did not exit within {:?} of kill", KILL_GRACE);
                Ok(None)
            }
        }
    }

    /// Exit code recorded by [`shutdown`](Self::shutdown), if any.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code.flatten()
    }

    /// Consume the streamer into a `futures::Stream` of cleaned lines.
    ///
    /// The child is shut down when the stream ends cleanly; on error or
    /// an early drop, `kill_on_drop` takes over.
    pub fn into_stream(self) -> impl Stream<Item = Result<String, StreamError>> {
        futures::stream::try_unfold(self, |mut streamer| async move {
            match streamer.next_line().await? {
                Some(line) => Ok(Some((line, streamer))),
                None => {
                    streamer.shutdown().await?;
                    Ok(None)
                }
            }
        })
    }
}

/// Pump one output stream into the shared queue until end-of-input.
///
/// `tag` is prepended to the raw bytes before cleaning, so stderr lines
/// enter the queue already marked. A full queue suspends the send; the
/// send only fails once the consumer is gone, at which point there is
/// nothing left to pump for. Read errors stop this pump without
/// affecting its sibling.
async fn pump<R>(stream: R, tx: mpsc::Sender<String>, name: &'static str, tag: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break, // EOF: stream closed by exit or kill
            Ok(_) => {
                let mut raw = Vec::with_capacity(tag.len() + buf.len());
                raw.extend_from_slice(tag.as_bytes());
                raw.extend_from_slice(&buf);
                if tx.send(clean_line(&raw)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("{} pump stopped on read error: {}", name, e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(code: &str) -> ShellCommand {
        ShellCommand::new(code).timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn echo_yields_one_line_then_exhausts() {
        let mut shell = ProcessStreamer::spawn(cmd("echo hello")).unwrap();
        assert_eq!(shell.next_line().await.unwrap(), Some("hello".to_string()));
        assert_eq!(shell.next_line().await.unwrap(), None);
        assert_eq!(shell.shutdown().await.unwrap(), Some(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_lines_are_tagged() {
        let mut shell = ProcessStreamer::spawn(cmd(">&2 echo oops")).unwrap();
        assert_eq!(
            shell.next_line().await.unwrap(),
            Some("[stderr] oops".to_string())
        );
        assert_eq!(shell.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn same_stream_order_is_preserved() {
        let mut shell = ProcessStreamer::spawn(cmd("printf 'a\\nb\\nc\\n'")).unwrap();
        let mut lines = Vec::new();
        while let Some(line) = shell.next_line().await.unwrap() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn silent_process_times_out_within_poll_granularity() {
        let mut shell = ProcessStreamer::spawn(
            ShellCommand::new("sleep 10").timeout(Duration::from_secs(1)),
        )
        .unwrap();

        let start = Instant::now();
        let err = shell.next_line().await.unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn empty_output_exhausts_cleanly() {
        let mut shell = ProcessStreamer::spawn(cmd("true")).unwrap();
        assert_eq!(shell.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let mut shell = ProcessStreamer::spawn(cmd("echo hi")).unwrap();
        while shell.next_line().await.unwrap().is_some() {}
        let first = shell.shutdown().await.unwrap();
        let second = shell.shutdown().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(shell.exit_code(), Some(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shutdown_kills_a_running_process() {
        let mut shell = ProcessStreamer::spawn(cmd("sleep 30")).unwrap();
        // Killed by SIGKILL, so no exit code on unix.
        let code = shell.shutdown().await.unwrap();
        assert_eq!(code, None);
    }

    #[tokio::test]
    async fn into_stream_collects_all_lines() {
        use futures::TryStreamExt;

        let shell = ProcessStreamer::spawn(cmd("printf '1\\n2\\n'")).unwrap();
        let lines: Vec<String> = shell.into_stream().try_collect().await.unwrap();
        assert_eq!(lines, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn ansi_output_is_stripped_in_flight() {
        let mut shell =
            ProcessStreamer::spawn(cmd("printf '\\033[31mred\\033[0m\\n'")).unwrap();
        assert_eq!(shell.next_line().await.unwrap(), Some("red".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unknown_command_reports_via_shell_stderr() {
        // Everything goes through `$SHELL -c`, so even nonsense spawns;
        // the shell itself reports the failure on stderr.
        let mut shell = ProcessStreamer::spawn(cmd("nonexistent_cmd_54321")).unwrap();
        let line = shell.next_line().await.unwrap();
        assert!(line.is_some());
        assert!(line.unwrap().starts_with("[stderr] "));
    }
}
