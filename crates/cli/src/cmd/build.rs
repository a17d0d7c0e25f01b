//! Implementation of the default `relstamp` command.
//!
//! Builds the project containing the start directory and publishes the
//! version-stamped release binary.

use std::future::Future;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::warn;

use relstamp_lib::{BuildOptions, PipelineError, PipelineReport, pipeline};

use crate::output::{OutputFormat, print_dry_run, print_json, print_published};

/// JSON body printed on failure with `--output json`.
#[derive(Debug, Serialize)]
struct FailureReport<'a> {
  error: &'a str,
  message: String,
  exit_code: i32,
}

/// Run the pipeline and print its result.
///
/// The run is cancelled on Ctrl-C, or once `timeout` elapses if given.
/// Pipeline failures are returned as [`PipelineError`] inside the `anyhow`
/// error so `main` can map them to exit codes.
pub fn cmd_build(
  options: BuildOptions,
  start_dir: &Path,
  timeout: Option<Duration>,
  output: OutputFormat,
) -> Result<()> {
  let start = Instant::now();

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let result = rt.block_on(pipeline::run(options, start_dir, cancellation(timeout)));

  match result {
    Ok(report) => {
      print_report(&report, start.elapsed(), output)?;
      Ok(())
    }
    Err(err) => {
      if output.is_json() {
        print_json(&FailureReport {
          error: err.kind(),
          message: err.to_string(),
          exit_code: err.exit_code(),
        })?;
      }
      Err(err.into())
    }
  }
}

/// Resolves on Ctrl-C or when `timeout` elapses, whichever comes first.
async fn cancellation(timeout: Option<Duration>) {
  cancellation_on(tokio::signal::ctrl_c(), timeout).await
}

/// [`cancellation`] with the interrupt source injected.
///
/// If listening for the interrupt fails, only the deadline can cancel.
async fn cancellation_on<S>(interrupt: S, timeout: Option<Duration>)
where
  S: Future<Output = io::Result<()>>,
{
  let deadline = async {
    match timeout {
      Some(limit) => {
        tokio::time::sleep(limit).await;
        warn!("timed out after {}, stopping build", humantime::format_duration(limit));
      }
      None => std::future::pending().await,
    }
  };
  tokio::pin!(deadline);

  tokio::select! {
    signal = interrupt => match signal {
      Ok(()) => warn!("interrupted, stopping build"),
      Err(e) => {
        warn!(error = %e, "unable to listen for Ctrl-C");
        deadline.await;
      }
    },
    _ = &mut deadline => {}
  }
}

fn print_report(report: &PipelineReport, elapsed: Duration, output: OutputFormat) -> Result<()> {
  if output.is_json() {
    return print_json(report);
  }

  println!();
  if report.outcome.dry_run {
    print_dry_run(report, elapsed);
  } else {
    print_published(report, elapsed);
  }
  Ok(())
}

/// Exit code for a failed run: the stage's code, or 1 for anything else.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
  err.downcast_ref::<PipelineError>().map_or(1, PipelineError::exit_code)
}
