//! Build tool resolution.
//!
//! Finds the `cargo` executable (explicit override or `PATH` lookup) and
//! checks that it identifies itself as cargo before anything is built with it.

use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::consts::{TOOL_NAME, TOOL_VERSION_PREFIX};
use crate::platform::paths;

#[derive(Debug, Error)]
pub enum ToolError {
  /// The explicit override could not be made absolute.
  #[error("failed to resolve tool path {}: {source}", path.display())]
  Resolve { path: PathBuf, source: io::Error },

  #[error("{name} not found on PATH: {source}")]
  NotFound {
    name: &'static str,
    #[source]
    source: which::Error,
  },

  /// The version probe could not be run or exited unsuccessfully.
  #[error("unable to execute {} --version: {reason}", path.display())]
  Probe { path: PathBuf, reason: String },

  #[error("{} does not look like {expected}: {output:?}", path.display())]
  Unexpected {
    path: PathBuf,
    expected: &'static str,
    output: String,
  },

  /// `--version` was still running when the run was cancelled.
  #[error("{command} was cancelled")]
  Cancelled { command: String },
}

/// Determine which executable to invoke.
///
/// An explicit path is made absolute against the current directory but not
/// checked for existence; [`validate_tool`] catches a bad override.
pub fn resolve_tool(explicit: Option<&Path>) -> Result<PathBuf, ToolError> {
  resolve_tool_in(explicit, std::env::var_os("PATH"))
}

/// Like [`resolve_tool`], searching `search_path` instead of the process `PATH`.
pub fn resolve_tool_in(explicit: Option<&Path>, search_path: Option<OsString>) -> Result<PathBuf, ToolError> {
  if let Some(path) = explicit {
    let resolved = paths::absolute_from_cwd(path).map_err(|source| ToolError::Resolve {
      path: path.to_path_buf(),
      source,
    })?;
    debug!(path = %resolved.display(), "using explicit tool path");
    return Ok(resolved);
  }

  let cwd = std::env::current_dir().map_err(|source| ToolError::Resolve {
    path: PathBuf::from(TOOL_NAME),
    source,
  })?;
  let found = which::which_in(TOOL_NAME, search_path, cwd).map_err(|source| ToolError::NotFound {
    name: TOOL_NAME,
    source,
  })?;
  debug!(path = %found.display(), "found tool on PATH");
  Ok(found)
}

/// Run `{path} --version` and require stdout to start with `"cargo "`.
///
/// The check is raced against `cancel`; a tool that never answers is killed
/// when `cancel` completes first.
pub async fn validate_tool<C>(path: &Path, cancel: C) -> Result<(), ToolError>
where
  C: Future<Output = ()>,
{
  let probe_failed = |reason: String| ToolError::Probe {
    path: path.to_path_buf(),
    reason,
  };

  let child = Command::new(path)
    .arg("--version")
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true)
    .spawn()
    .map_err(|e| probe_failed(e.to_string()))?;

  let output = tokio::select! {
    output = child.wait_with_output() => output.map_err(|e| probe_failed(e.to_string()))?,
    _ = cancel => {
      warn!(path = %path.display(), "cancelling tool version check");
      return Err(ToolError::Cancelled {
        command: format!("{} --version", path.display()),
      });
    }
  };

  if !output.status.success() {
    return Err(probe_failed(format!("exited with {}", output.status)));
  }

  let stdout = String::from_utf8_lossy(&output.stdout);
  if !stdout.starts_with(TOOL_VERSION_PREFIX) {
    return Err(ToolError::Unexpected {
      path: path.to_path_buf(),
      expected: TOOL_NAME,
      output: stdout.lines().next().unwrap_or_default().to_string(),
    });
  }

  debug!(version = %stdout.trim(), "tool validated");
  Ok(())
}
