//! Envelope module hosted in a child process.
//!
//! The child reads one JSON message per line on stdin and answers with one
//! JSON line on stdout. Calls are serialized: a request line is always
//! followed by its own response line before the next request is written.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{EnvelopeModule, NativeError, NativeResult};

struct ChildIo {
    // Held so the process is killed when the pipes are dropped.
    _child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// [`EnvelopeModule`] speaking line-delimited JSON with a spawned process.
///
/// The process is started lazily on the first call and restarted on the next
/// call after it exits, a pipe breaks, or a call is abandoned mid-exchange.
pub struct ProcessEnvelopeModule {
    program: String,
    args: Vec<String>,
    io: Mutex<Option<ChildIo>>,
}

impl ProcessEnvelopeModule {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            io: Mutex::new(None),
        }
    }

    /// Build from a whitespace-separated command line. Returns `None` when empty.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts.map(String::from).collect::<Vec<_>>()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn spawn(&self) -> NativeResult<ChildIo> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| NativeError::new(format!("failed to spawn '{}': {e}", self.program)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| NativeError::new("envelope process has no stdin pipe"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| NativeError::new("envelope process has no stdout pipe"))?;

        debug!(program = %self.program, pid = ?child.id(), "spawned envelope process");
        Ok(ChildIo {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }
}

impl std::fmt::Debug for ProcessEnvelopeModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessEnvelopeModule")
            .field("program", &self.program)
            .field("args", &self.args)
            .finish()
    }
}

#[async_trait]
impl EnvelopeModule for ProcessEnvelopeModule {
    async fn call(&self, message: String) -> NativeResult<String> {
        if message.contains('\n') {
            return Err(NativeError::new("envelope message must be a single line"));
        }

        let mut guard = self.io.lock().await;
        // The exchange owns the pipes. If this future is dropped mid-call the
        // child is killed with them, so no stale reply is left for the next caller.
        let mut io = match guard.take() {
            Some(io) => io,
            None => self.spawn()?,
        };

        let exchange = async {
            io.stdin.write_all(message.as_bytes()).await?;
            io.stdin.write_all(b"\n").await?;
            io.stdin.flush().await?;
            let mut line = String::new();
            let n = io.stdout.read_line(&mut line).await?;
            Ok::<_, std::io::Error>((n, line))
        };

        let outcome = exchange.await;
        match outcome {
            Ok((0, _)) => {
                warn!(program = %self.program, "envelope process closed its output");
                Err(NativeError::new(format!(
                    "envelope process '{}' exited before answering",
                    self.program
                )))
            }
            Ok((_, line)) => {
                *guard = Some(io);
                Ok(line.trim_end().to_string())
            }
            Err(e) => Err(NativeError::new(format!(
                "envelope process '{}' I/O error: {e}",
                self.program
            ))),
        }
    }
}
