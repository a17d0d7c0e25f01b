use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::build::BuildError;
use crate::manifest::{ManifestError, ProjectManifest, ValidationError};
use crate::publish::{PublishError, PublishOutcome};
use crate::tool::ToolError;

/// Invocation options, captured once from the command line.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
  /// Forward tool output live instead of capturing it.
  pub verbose: bool,
  /// Run `cargo clean` before building.
  pub clean: bool,
  /// Publish here instead of `target/release`. Relative paths resolve against the project root.
  pub output_dir: Option<PathBuf>,
  /// Use this executable instead of looking `cargo` up on `PATH`.
  pub tool_path: Option<PathBuf>,
  /// Log planned actions without running the tool or touching the filesystem.
  pub dry_run: bool,
}

/// Everything the build and publish stages need for one run.
#[derive(Debug, Clone)]
pub struct PipelineContext {
  pub options: BuildOptions,
  /// Absolute directory containing `Cargo.toml`.
  pub project_root: PathBuf,
  pub manifest: ProjectManifest,
  /// Absolute path of the validated tool executable.
  pub tool: PathBuf,
}

impl PipelineContext {
  pub fn is_dry_run(&self) -> bool {
    self.options.dry_run
  }

  pub fn project_root(&self) -> &Path {
    &self.project_root
  }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
  pub name: String,
  pub version: String,
  pub project_root: PathBuf,
  pub tool: PathBuf,
  pub outcome: PublishOutcome,
}

/// A pipeline failure, tagged with the stage that produced it.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("project discovery: {0}")]
  ProjectNotFound(#[source] ManifestError),

  #[error("config loading: {0}")]
  ManifestRead(#[source] ManifestError),

  #[error("config loading: {0}")]
  ManifestParse(#[source] ManifestError),

  #[error("config validation: {0}")]
  ManifestValidation(#[source] ValidationError),

  #[error("version validation: {0}")]
  VersionFormat(#[source] ValidationError),

  #[error("cargo resolution: {0}")]
  ToolResolution(#[source] ToolError),

  #[error("cargo validation: {0}")]
  ToolValidation(#[source] ToolError),

  #[error("build pipeline: {0}")]
  Subprocess(#[source] BuildError),

  /// A tool invocation (`cargo --version` or a build step) was cancelled.
  #[error("build pipeline: {0} was cancelled")]
  Cancelled(String),

  #[error("binary location: {0}")]
  BinaryNotFound(#[source] PublishError),

  #[error("binary copy: {0}")]
  Publish(#[source] PublishError),
}

impl PipelineError {
  /// Process exit code for this failure. Each stage has its own code so
  /// scripts can branch on what went wrong.
  pub fn exit_code(&self) -> i32 {
    match self {
      PipelineError::ProjectNotFound(_) => 10,
      PipelineError::ManifestRead(_) => 11,
      PipelineError::ManifestParse(_) => 12,
      PipelineError::ManifestValidation(_) => 13,
      PipelineError::VersionFormat(_) => 14,
      PipelineError::ToolResolution(_) => 15,
      PipelineError::ToolValidation(_) => 16,
      PipelineError::Subprocess(_) => 17,
      PipelineError::Cancelled(_) => 18,
      PipelineError::BinaryNotFound(_) => 19,
      PipelineError::Publish(_) => 20,
    }
  }

  /// Short machine-readable name of the failing stage.
  pub fn kind(&self) -> &'static str {
    match self {
      PipelineError::ProjectNotFound(_) => "project_not_found",
      PipelineError::ManifestRead(_) => "manifest_read",
      PipelineError::ManifestParse(_) => "manifest_parse",
      PipelineError::ManifestValidation(_) => "manifest_validation",
      PipelineError::VersionFormat(_) => "version_format",
      PipelineError::ToolResolution(_) => "tool_resolution",
      PipelineError::ToolValidation(_) => "tool_validation",
      PipelineError::Subprocess(_) => "subprocess",
      PipelineError::Cancelled(_) => "cancelled",
      PipelineError::BinaryNotFound(_) => "binary_not_found",
      PipelineError::Publish(_) => "publish",
    }
  }
}

impl From<ManifestError> for PipelineError {
  fn from(err: ManifestError) -> Self {
    match err {
      ManifestError::ProjectNotFound { .. } | ManifestError::StartDir { .. } => PipelineError::ProjectNotFound(err),
      ManifestError::Read { .. } => PipelineError::ManifestRead(err),
      ManifestError::Parse { .. } => PipelineError::ManifestParse(err),
    }
  }
}

impl From<ValidationError> for PipelineError {
  fn from(err: ValidationError) -> Self {
    if err.is_version_format() {
      PipelineError::VersionFormat(err)
    } else {
      PipelineError::ManifestValidation(err)
    }
  }
}

impl From<BuildError> for PipelineError {
  fn from(err: BuildError) -> Self {
    match err {
      BuildError::Cancelled { command } => PipelineError::Cancelled(command),
      err => PipelineError::Subprocess(err),
    }
  }
}

impl PipelineError {
  /// Classify a failure of the `cargo --version` check.
  pub fn from_tool_validation(err: ToolError) -> Self {
    match err {
      ToolError::Cancelled { command } => PipelineError::Cancelled(command),
      err => PipelineError::ToolValidation(err),
    }
  }
}

impl From<PublishError> for PipelineError {
  fn from(err: PublishError) -> Self {
    if matches!(err, PublishError::BinaryNotFound { .. }) {
      PipelineError::BinaryNotFound(err)
    } else {
      PipelineError::Publish(err)
    }
  }
}
