//! Terminal output for the final result of a run.
//!
//! Logs go to stderr through tracing. The summary printed here goes to
//! stdout, as text with colored status symbols or as JSON.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};
use relstamp_lib::PipelineReport;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

/// Summary of a run that published a binary.
pub fn print_published(report: &PipelineReport, elapsed: Duration) {
  let outcome = &report.outcome;
  println!(
    "{} SUCCESS: {} ({} bytes)",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    outcome.destination.display(),
    outcome.bytes.unwrap_or_default()
  );
  detail("Package", &format!("{} v{}", report.name, report.version));
  detail("Took", &elapsed_text(elapsed));
}

/// Summary of a dry run: what would have been published where.
pub fn print_dry_run(report: &PipelineReport, elapsed: Duration) {
  let outcome = &report.outcome;
  println!(
    "{} Dry run - no changes made",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue())
  );
  detail(
    "Would publish",
    &format!(
      "{} {} {}",
      outcome.source.display(),
      symbols::ARROW,
      outcome.destination.display()
    ),
  );
  detail("Took", &elapsed_text(elapsed));
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

fn detail(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// Wall-clock time rounded down to whole milliseconds, e.g. `1s 500ms`.
fn elapsed_text(elapsed: Duration) -> String {
  let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
  humantime::format_duration(Duration::from_millis(millis)).to_string()
}
