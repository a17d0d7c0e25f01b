//! End-to-end release pipeline.
//!
//! discover root → load manifest → validate → resolve and validate cargo →
//! (clean) → build → locate binary → publish. Stages run sequentially and the
//! first failure aborts the run with a [`PipelineError`] naming the stage.
//! Nothing is retried.

mod types;

use std::future::Future;
use std::path::Path;

use tracing::{debug, info};

use crate::build::{run_build, run_clean};
use crate::manifest::{load_manifest, locate_project_root, validate, validate_version_string};
use crate::publish::{binary_path, locate_binary, publish};
use crate::tool::{resolve_tool, validate_tool};

pub use types::{BuildOptions, PipelineContext, PipelineError, PipelineReport};

/// Discover the project, validate its manifest, and resolve the build tool.
///
/// No subprocess other than the `cargo --version` probe runs here, and the
/// probe only runs once the manifest has passed validation. It is
/// raced against `cancel`.
pub async fn prepare<C>(options: BuildOptions, start_dir: &Path, cancel: C) -> Result<PipelineContext, PipelineError>
where
  C: Future<Output = ()>,
{
  let project_root = locate_project_root(start_dir)?;
  info!("Project root: {}", project_root.display());

  let manifest = load_manifest(&project_root)?;
  validate(&manifest)?;
  validate_version_string(&manifest.version)?;

  let tool = resolve_tool(options.tool_path.as_deref()).map_err(PipelineError::ToolResolution)?;
  validate_tool(&tool, cancel)
    .await
    .map_err(PipelineError::from_tool_validation)?;

  Ok(PipelineContext {
    options,
    project_root,
    manifest,
    tool,
  })
}

/// Run the whole pipeline starting root discovery at `start_dir`.
///
/// `cancel` is raced against every tool invocation, the version check
/// included; if it completes first the running child is killed and
/// [`PipelineError::Cancelled`] is returned.
pub async fn run<C>(options: BuildOptions, start_dir: &Path, cancel: C) -> Result<PipelineReport, PipelineError>
where
  C: Future<Output = ()>,
{
  tokio::pin!(cancel);
  let ctx = prepare(options, start_dir, cancel.as_mut()).await?;
  execute(&ctx, cancel).await
}

/// Build and publish for an already prepared context.
pub async fn execute<C>(ctx: &PipelineContext, cancel: C) -> Result<PipelineReport, PipelineError>
where
  C: Future<Output = ()>,
{
  tokio::pin!(cancel);

  info!("Building {} v{}", ctx.manifest.name, ctx.manifest.version);
  debug!(tool = %ctx.tool.display(), root = %ctx.project_root.display(), "build context");

  if ctx.options.clean {
    run_clean(ctx, cancel.as_mut()).await?;
  }
  run_build(ctx, cancel.as_mut()).await?;

  // A dry run skipped the build, so the binary may legitimately be absent.
  let binary = if ctx.is_dry_run() {
    binary_path(ctx)
  } else {
    locate_binary(ctx)?
  };

  let outcome = publish(ctx, &binary)?;

  Ok(PipelineReport {
    name: ctx.manifest.name.clone(),
    version: ctx.manifest.version.clone(),
    project_root: ctx.project_root.clone(),
    tool: ctx.tool.clone(),
    outcome,
  })
}
