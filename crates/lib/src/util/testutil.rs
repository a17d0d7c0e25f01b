//! Test utilities for relstamp-lib.
//!
//! Builds fake `cargo` executables as shell scripts so the pipeline can be
//! exercised without a real toolchain. Unix only.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Write an executable `/bin/sh` script named `name` into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
  fs::create_dir_all(dir).unwrap();
  let path = dir.join(name);
  fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
  fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
  path
}

/// Builder for a fake `cargo`.
///
/// The script answers `--version` like cargo, records every invocation
/// (one line of arguments) in `invocations.log` next to itself, removes
/// `target` on `clean`, and on `build` writes a zero-filled binary of the
/// configured size to `target/release/<name>` in its working directory.
pub struct FakeTool {
  dir: PathBuf,
  binary: Option<(String, usize)>,
  fail_build: bool,
  build_delay_secs: Option<u32>,
}

impl FakeTool {
  pub fn new(dir: &Path) -> Self {
    Self {
      dir: dir.to_path_buf(),
      binary: None,
      fail_build: false,
      build_delay_secs: None,
    }
  }

  /// Produce `target/release/{name}` of `size` bytes on build.
  pub fn producing(mut self, name: &str, size: usize) -> Self {
    self.binary = Some((name.to_string(), size));
    self
  }

  /// Print to both streams and exit 101 on build.
  pub fn failing(mut self) -> Self {
    self.fail_build = true;
    self
  }

  /// Sleep before doing anything on build.
  pub fn slow(mut self, secs: u32) -> Self {
    self.build_delay_secs = Some(secs);
    self
  }

  /// Path of the invocation log.
  pub fn log_path(&self) -> PathBuf {
    self.dir.join("invocations.log")
  }

  /// Write the script and return its path.
  pub fn install(&self) -> PathBuf {
    let mut build = String::new();
    if let Some(secs) = self.build_delay_secs {
      build.push_str(&format!("    sleep {secs}\n"));
    }
    if self.fail_build {
      build.push_str("    echo 'Compiling fake v0.0.0'\n");
      build.push_str("    echo 'error: could not compile `fake`' >&2\n");
      build.push_str("    exit 101\n");
    } else if let Some((name, size)) = &self.binary {
      build.push_str("    mkdir -p target/release\n");
      build.push_str(&format!("    head -c {size} /dev/zero > target/release/{name}\n"));
      build.push_str("    echo 'Finished release profile'\n");
    }

    let body = format!(
      r#"echo "$@" >> '{log}'
case "$1" in
  --version)
    echo 'cargo 1.80.0 (fake 2024-07-21)'
    ;;
  clean)
    rm -rf target
    ;;
  build)
{build}    ;;
esac"#,
      log = self.log_path().display(),
    );

    write_script(&self.dir, "cargo", &body)
  }

  /// Recorded invocations, one per line.
  pub fn invocations(&self) -> Vec<String> {
    fs::read_to_string(self.log_path())
      .map(|s| s.lines().map(str::to_string).collect())
      .unwrap_or_default()
  }
}
