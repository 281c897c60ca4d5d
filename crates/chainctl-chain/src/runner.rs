//! Running node commands
//!
//! - [`Runner`]: executes [`Step`]s rendered by a [`ChainCmd`]
//! - [`NodeProcess`]: a long-running node started by [`Runner::spawn`]
//! - [`OutputSink`] / [`LabeledOutput`]: where verbose child output goes
//!
//! Without an output sink child output is discarded (long-running) or only
//! captured (one-shot). With one, every line is forwarded with a fixed-width
//! label so output of several processes stays aligned.

use crate::chaincmd::{ChainCmd, Step};
use crate::error::{ChainError, ProcessError, Result};
use std::fmt;
use std::io::Write;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Width of the output label column
pub const LABEL_WIDTH: usize = 10;

/// Which child stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// Receives labeled child output lines
pub trait OutputSink: Send + Sync + fmt::Debug {
    /// Write one line
    fn write_line(&self, stream: Stream, line: &str);
}

/// Sink writing to this process's stdout/stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioSink;

impl OutputSink for StdioSink {
    fn write_line(&self, stream: Stream, line: &str) {
        // Write errors on a closed terminal are ignored.
        let _ = match stream {
            Stream::Stdout => writeln!(std::io::stdout().lock(), "{line}"),
            Stream::Stderr => writeln!(std::io::stderr().lock(), "{line}"),
        };
    }
}

/// An output sink with a fixed-width prefix
#[derive(Debug, Clone)]
pub struct LabeledOutput {
    label: String,
    sink: Arc<dyn OutputSink>,
}

impl LabeledOutput {
    /// Label is truncated or padded to [`LABEL_WIDTH`]
    #[must_use]
    pub fn new(label: &str, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            label: format_label(label),
            sink,
        }
    }

    /// Formatted label
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    fn emit(&self, stream: Stream, line: &str) {
        self.sink
            .write_line(stream, &format!("{} | {line}", self.label));
    }
}

fn format_label(label: &str) -> String {
    let truncated: String = label.chars().take(LABEL_WIDTH).collect();
    format!("{truncated:<width$}", width = LABEL_WIDTH)
}

/// Captured result of a one-shot step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

/// Executes steps for one chain
#[derive(Debug, Clone)]
pub struct Runner {
    cmd: ChainCmd,
    output: Option<LabeledOutput>,
}

impl Runner {
    /// Create a runner; `output` is attached in verbose mode
    #[must_use]
    pub fn new(cmd: ChainCmd, output: Option<LabeledOutput>) -> Self {
        Self { cmd, output }
    }

    /// Command builder
    #[inline]
    #[must_use]
    pub fn cmd(&self) -> &ChainCmd {
        &self.cmd
    }

    /// Attached output, if verbose
    #[inline]
    #[must_use]
    pub fn output(&self) -> Option<&LabeledOutput> {
        self.output.as_ref()
    }

    /// Run a step to completion
    ///
    /// # Errors
    /// - `ProcessError::Spawn` / `Exit` on failure
    /// - `ChainError::Cancelled` if `cancel` fires first; the child is killed
    pub async fn run(&self, step: &Step, cancel: &CancellationToken) -> Result<StepOutput> {
        run_step(step, cancel, self.output.as_ref()).await
    }

    /// Start a long-running step
    ///
    /// # Errors
    /// `ProcessError::Spawn` if the process cannot be started.
    pub fn spawn(&self, step: &Step) -> Result<NodeProcess> {
        let verbose = self.output.is_some();
        let stdio = || if verbose { Stdio::piped() } else { Stdio::null() };

        let mut command = step.to_command();
        command
            .stdin(Stdio::null())
            .stdout(stdio())
            .stderr(stdio())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: step.program_name(),
            source,
        })?;

        let mut pumps = Vec::new();
        if let Some(output) = &self.output {
            if let Some(stdout) = child.stdout.take() {
                pumps.push(pump(stdout, Stream::Stdout, output.clone()));
            }
            if let Some(stderr) = child.stderr.take() {
                pumps.push(pump(stderr, Stream::Stderr, output.clone()));
            }
        }

        tracing::debug!(command = %step, pid = child.id(), "spawned node process");
        Ok(NodeProcess {
            program: step.program_name(),
            pid: child.id(),
            child,
            pumps,
        })
    }
}

/// Run a step to completion, optionally forwarding its output
pub(crate) async fn run_step(
    step: &Step,
    cancel: &CancellationToken,
    output: Option<&LabeledOutput>,
) -> Result<StepOutput> {
    let program = step.program_name();
    let mut command = step.to_command();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;

    tracing::trace!(command = %step, "running step");
    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(ChainError::Cancelled),
        result = child.wait_with_output() => result,
    };
    let raw = result.map_err(|source| ProcessError::Io {
        program: program.clone(),
        source,
    })?;

    let captured = StepOutput {
        stdout: String::from_utf8_lossy(&raw.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&raw.stderr).into_owned(),
    };

    if let Some(output) = output {
        captured.stdout.lines().for_each(|l| output.emit(Stream::Stdout, l));
        captured.stderr.lines().for_each(|l| output.emit(Stream::Stderr, l));
    }

    if !raw.status.success() {
        return Err(ProcessError::Exit {
            program,
            code: raw.status.code(),
            stderr: captured.stderr.trim().to_string(),
        }
        .into());
    }
    Ok(captured)
}

fn pump<R>(reader: R, stream: Stream, output: LabeledOutput) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            output.emit(stream, &line);
        }
    })
}

/// A running node
#[derive(Debug)]
pub struct NodeProcess {
    program: String,
    pid: Option<u32>,
    child: Child,
    pumps: Vec<JoinHandle<()>>,
}

impl NodeProcess {
    /// OS process id
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the node to exit on its own
    ///
    /// Cancel-safe: dropping the future leaves the process running.
    ///
    /// # Errors
    /// `ProcessError::Io` if waiting fails.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        let status = self.child.wait().await.map_err(|source| ProcessError::Io {
            program: self.program.clone(),
            source,
        })?;
        self.drain_output().await;
        Ok(status)
    }

    /// Kill the node and reap it
    ///
    /// # Errors
    /// `ProcessError::Io` if the process cannot be signalled or reaped.
    pub async fn stop(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.child.try_wait().map_err(|source| self.io(source))? {
            self.drain_output().await;
            return Ok(status);
        }

        self.child.start_kill().map_err(|source| self.io(source))?;
        let status = self.child.wait().await.map_err(|source| self.io(source))?;
        self.drain_output().await;
        tracing::debug!(pid = self.pid, "node process stopped");
        Ok(status)
    }

    /// Wait for exit, or kill the node once `cancel` fires
    ///
    /// Returns `None` when cancelled. The process is reaped either way.
    ///
    /// # Errors
    /// `ProcessError::Io` if waiting or killing fails.
    pub async fn wait_or_cancel(&mut self, cancel: &CancellationToken) -> Result<Option<ExitStatus>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.stop().await?;
                Ok(None)
            }
            status = self.wait() => status.map(Some),
        }
    }

    fn io(&self, source: std::io::Error) -> ProcessError {
        ProcessError::Io {
            program: self.program.clone(),
            source,
        }
    }

    async fn drain_output(&mut self) {
        for pump in self.pumps.drain(..) {
            let _ = pump.await;
        }
    }
}
