//! Build tool invocation.
//!
//! Runs `cargo clean` and `cargo build --release` in the project root. In
//! quiet mode both output streams are captured into one buffer that is only
//! shown when the command fails; verbose mode streams them live. Every run
//! races the child against a cancellation future and kills the child if the
//! future completes first.

use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::pipeline::PipelineContext;

/// Errors that can occur while running the build tool.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("failed to start {command}: {source}")]
  Spawn { command: String, source: io::Error },

  /// `code` is `None` when the child was terminated by a signal.
  #[error("{command} {}", describe_exit(.code))]
  Failed { command: String, code: Option<i32> },

  #[error("{command} was cancelled")]
  Cancelled { command: String },

  /// Reading the child's output or waiting on it failed.
  #[error("i/o error while running {command}: {source}")]
  Io { command: String, source: io::Error },
}

fn describe_exit(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("failed with exit code {code}"),
    None => "was terminated by a signal".to_string(),
  }
}

/// What happens to the child's stdout and stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
  /// Forward both streams to ours as they are written.
  Inherit,
  /// Buffer both streams; print the buffer to stderr only on failure.
  Capture,
}

impl OutputMode {
  pub fn for_verbosity(verbose: bool) -> Self {
    if verbose { OutputMode::Inherit } else { OutputMode::Capture }
  }
}

/// A single tool command, run with an explicit working directory.
#[derive(Debug, Clone)]
pub struct ToolCommand {
  pub program: PathBuf,
  pub args: Vec<String>,
  pub cwd: PathBuf,
  pub mode: OutputMode,
}

impl ToolCommand {
  pub fn new(program: &Path, args: &[&str], cwd: &Path, mode: OutputMode) -> Self {
    Self {
      program: program.to_path_buf(),
      args: args.iter().map(|a| a.to_string()).collect(),
      cwd: cwd.to_path_buf(),
      mode,
    }
  }

  /// Human-readable form used in logs and errors, e.g. `cargo build --release`.
  pub fn display_name(&self) -> String {
    let program = self
      .program
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| self.program.display().to_string());
    std::iter::once(program)
      .chain(self.args.iter().cloned())
      .collect::<Vec<_>>()
      .join(" ")
  }

  /// Run to completion, writing captured output to stderr on failure.
  pub async fn run<C>(&self, cancel: C) -> Result<(), BuildError>
  where
    C: Future<Output = ()>,
  {
    self.run_with_sink(cancel, &mut io::stderr()).await
  }

  /// Like [`ToolCommand::run`], but failure output goes to `sink`.
  pub async fn run_with_sink<C, W>(&self, cancel: C, sink: &mut W) -> Result<(), BuildError>
  where
    C: Future<Output = ()>,
    W: Write,
  {
    let command = self.display_name();
    debug!(program = %self.program.display(), args = ?self.args, cwd = %self.cwd.display(), "spawning process");

    let mut cmd = Command::new(&self.program);
    cmd.args(&self.args).current_dir(&self.cwd).kill_on_drop(true);
    if self.mode == OutputMode::Capture {
      cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    }

    let mut child = cmd.spawn().map_err(|source| BuildError::Spawn {
      command: command.clone(),
      source,
    })?;

    let finished = tokio::select! {
      result = wait_for(&mut child, self.mode) => Some(result),
      _ = cancel => None,
    };

    let Some(result) = finished else {
      warn!(command = %command, "cancelling running command");
      if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill cancelled command");
      }
      return Err(BuildError::Cancelled { command });
    };

    let (status, captured) = result.map_err(|source| BuildError::Io {
      command: command.clone(),
      source,
    })?;

    if status.success() {
      return Ok(());
    }

    if let Some(output) = captured {
      flush_captured(sink, &output);
    }

    Err(BuildError::Failed {
      command,
      code: status.code(),
    })
  }
}

/// Run `cargo clean` in the project root, or only log it in dry-run mode.
pub async fn run_clean<C>(ctx: &PipelineContext, cancel: C) -> Result<(), BuildError>
where
  C: Future<Output = ()>,
{
  run_step(ctx, &["clean"], cancel).await
}

/// Run `cargo build --release` in the project root, or only log it in dry-run mode.
pub async fn run_build<C>(ctx: &PipelineContext, cancel: C) -> Result<(), BuildError>
where
  C: Future<Output = ()>,
{
  run_step(ctx, &["build", "--release"], cancel).await
}

async fn run_step<C>(ctx: &PipelineContext, args: &[&str], cancel: C) -> Result<(), BuildError>
where
  C: Future<Output = ()>,
{
  let command = ToolCommand::new(
    &ctx.tool,
    args,
    ctx.project_root(),
    OutputMode::for_verbosity(ctx.options.verbose),
  );
  let name = command.display_name();

  info!("Running: {}", name);
  if ctx.is_dry_run() {
    info!("[DRY-RUN] Skipping {}", name);
    return Ok(());
  }

  command.run(cancel).await
}

async fn wait_for(child: &mut Child, mode: OutputMode) -> io::Result<(ExitStatus, Option<Vec<u8>>)> {
  match mode {
    OutputMode::Inherit => Ok((child.wait().await?, None)),
    OutputMode::Capture => {
      let output = capture_combined(child).await?;
      let status = child.wait().await?;
      Ok((status, Some(output)))
    }
  }
}

/// Drain stdout and stderr into one buffer in the order chunks arrive.
async fn capture_combined(child: &mut Child) -> io::Result<Vec<u8>> {
  let mut stdout = child.stdout.take();
  let mut stderr = child.stderr.take();
  let mut combined = Vec::new();
  let mut out_buf = [0u8; 8192];
  let mut err_buf = [0u8; 8192];

  while stdout.is_some() || stderr.is_some() {
    tokio::select! {
      read = read_chunk(&mut stdout, &mut out_buf) => match read? {
        0 => stdout = None,
        n => combined.extend_from_slice(&out_buf[..n]),
      },
      read = read_chunk(&mut stderr, &mut err_buf) => match read? {
        0 => stderr = None,
        n => combined.extend_from_slice(&err_buf[..n]),
      },
    }
  }

  Ok(combined)
}

/// Read from a stream that may already be closed; a closed stream never resolves.
async fn read_chunk<R>(reader: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize>
where
  R: AsyncRead + Unpin,
{
  match reader {
    Some(r) => r.read(buf).await,
    None => std::future::pending().await,
  }
}

fn flush_captured<W: Write>(sink: &mut W, output: &[u8]) {
  let mut write = || -> io::Result<()> {
    sink.write_all(output)?;
    if !output.ends_with(b"\n") {
      sink.write_all(b"\n")?;
    }
    sink.flush()
  };
  if let Err(e) = write() {
    warn!(error = %e, "failed to write captured command output");
  }
}
