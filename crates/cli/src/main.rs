mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use relstamp_lib::BuildOptions;

use crate::cmd::{cmd_build, exit_code_for};
use crate::output::{OutputFormat, print_error};

/// relstamp - build a Cargo project and publish a version-stamped release binary
#[derive(Parser)]
#[command(name = "relstamp")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Stream cargo output live and enable debug logging
  #[arg(short, long)]
  verbose: bool,

  /// Run `cargo clean` before building
  #[arg(long)]
  clean: bool,

  /// Custom output directory (default: target/release, relative paths resolve against the project root)
  #[arg(short, long = "output-dir", value_name = "DIR")]
  output_dir: Option<PathBuf>,

  /// Explicit cargo binary path
  #[arg(long, value_name = "PATH")]
  cargo_path: Option<PathBuf>,

  /// Show planned actions without executing them
  #[arg(long)]
  dry_run: bool,

  /// Stop the build if it runs longer than this (e.g. "90s", "10m")
  #[arg(long, value_parser = humantime::parse_duration)]
  timeout: Option<Duration>,

  /// Start project discovery from this directory instead of the current one
  #[arg(short = 'C', long = "directory", value_name = "DIR")]
  directory: Option<PathBuf>,

  /// Output format for the final result
  #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,
}

impl Cli {
  fn build_options(&self) -> BuildOptions {
    BuildOptions {
      verbose: self.verbose,
      clean: self.clean,
      output_dir: self.output_dir.clone(),
      tool_path: self.cargo_path.clone(),
      dry_run: self.dry_run,
    }
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .without_time()
    .init();

  let start_dir = cli.directory.clone().unwrap_or_else(|| PathBuf::from("."));

  match cmd_build(cli.build_options(), &start_dir, cli.timeout, cli.output) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("Build failed: {}", err));
      let code = exit_code_for(&err);
      ExitCode::from(u8::try_from(code).unwrap_or(1))
    }
  }
}
