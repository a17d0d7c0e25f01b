//! Release artifact publication.
//!
//! Locates the binary cargo produced and copies it to
//! `{output_dir}/{name}-v{version}{exe}`. The copy is written to a `.tmp`
//! sibling, synced, and renamed into place, so anything watching the
//! destination sees either the previous file or the complete new one.
//! The temporary file is removed on every failure path.

use std::fs::{self, File, Metadata, OpenOptions, Permissions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::consts::{RELEASE_DIR, TEMP_SUFFIX};
use crate::pipeline::PipelineContext;
use crate::platform::{exe_extension, paths};

#[derive(Debug, Error)]
pub enum PublishError {
  #[error("binary not found at expected location: {}", path.display())]
  BinaryNotFound { path: PathBuf },

  #[error("create output directory {}: {source}", path.display())]
  CreateDir { path: PathBuf, source: io::Error },

  #[error("open source {}: {source}", path.display())]
  OpenSource { path: PathBuf, source: io::Error },

  #[error("create temp file {}: {source}", path.display())]
  CreateTemp { path: PathBuf, source: io::Error },

  #[error("copy data to {}: {source}", path.display())]
  Copy { path: PathBuf, source: io::Error },

  #[error("set permissions on {}: {source}", path.display())]
  Permissions { path: PathBuf, source: io::Error },

  #[error("fsync {}: {source}", path.display())]
  Sync { path: PathBuf, source: io::Error },

  #[error("atomic rename onto {}: {source}", path.display())]
  Rename { path: PathBuf, source: io::Error },

  #[error("stat destination file {}: {source}", path.display())]
  Stat { path: PathBuf, source: io::Error },
}

/// Where a binary was (or in dry-run, would be) published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
  pub source: PathBuf,
  pub destination: PathBuf,
  /// Size of the published file; `None` in dry-run.
  pub bytes: Option<u64>,
  pub dry_run: bool,
}

/// Conventional path of the release binary: `{root}/target/release/{name}{exe}`.
///
/// The path is fixed; `target/release` is not searched recursively.
pub fn binary_path(ctx: &PipelineContext) -> PathBuf {
  ctx
    .project_root()
    .join(RELEASE_DIR)
    .join(format!("{}{}", ctx.manifest.name, exe_extension()))
}

/// Return the release binary's path if it exists.
pub fn locate_binary(ctx: &PipelineContext) -> Result<PathBuf, PublishError> {
  let path = binary_path(ctx);
  if !paths::exists(&path) {
    return Err(PublishError::BinaryNotFound { path });
  }
  debug!(path = %path.display(), "located release binary");
  Ok(path)
}

/// Absolute output directory: the configured override, or `target/release`,
/// resolved against the project root when relative.
pub fn output_dir(ctx: &PipelineContext) -> PathBuf {
  let dir = ctx
    .options
    .output_dir
    .clone()
    .unwrap_or_else(|| PathBuf::from(RELEASE_DIR));
  paths::absolutize(ctx.project_root(), &dir)
}

/// Version-stamped file name: `{name}-v{version}{exe}`.
pub fn destination_filename(name: &str, version: &str) -> String {
  format!("{}-v{}{}", name, version, exe_extension())
}

/// Publish `source` into the output directory under its version-stamped name.
///
/// In dry-run mode only the planned mapping is logged; nothing is created.
pub fn publish(ctx: &PipelineContext, source: &Path) -> Result<PublishOutcome, PublishError> {
  publish_with(ctx, source, |path: &Path| fs::metadata(path))
}

/// [`publish`] with the final stat of the destination supplied by the caller.
fn publish_with(
  ctx: &PipelineContext,
  source: &Path,
  stat: fn(&Path) -> io::Result<Metadata>,
) -> Result<PublishOutcome, PublishError> {
  let out_dir = output_dir(ctx);

  if !ctx.is_dry_run() {
    fs::create_dir_all(&out_dir).map_err(|e| PublishError::CreateDir {
      path: out_dir.clone(),
      source: e,
    })?;
  }

  let destination = out_dir.join(destination_filename(&ctx.manifest.name, &ctx.manifest.version));

  if ctx.is_dry_run() {
    info!("[DRY-RUN] Would copy: {} -> {}", source.display(), destination.display());
    return Ok(PublishOutcome {
      source: source.to_path_buf(),
      destination,
      bytes: None,
      dry_run: true,
    });
  }

  atomic_copy(source, &destination)?;

  let metadata = stat(&destination).map_err(|e| PublishError::Stat {
    path: destination.clone(),
    source: e,
  })?;

  info!(bytes = metadata.len(), "published {}", destination.display());

  Ok(PublishOutcome {
    source: source.to_path_buf(),
    destination,
    bytes: Some(metadata.len()),
    dry_run: false,
  })
}

/// Path of the transient file used while publishing to `destination`.
pub fn temp_path_for(destination: &Path) -> PathBuf {
  let mut name = destination.as_os_str().to_os_string();
  name.push(TEMP_SUFFIX);
  PathBuf::from(name)
}

/// Copy `source` onto `destination` via a synced temporary sibling and a rename.
///
/// The published file takes the source's permissions, so an executable stays
/// executable.
pub fn atomic_copy(source: &Path, destination: &Path) -> Result<(), PublishError> {
  let mut reader = File::open(source).map_err(|e| PublishError::OpenSource {
    path: source.to_path_buf(),
    source: e,
  })?;
  let permissions = reader
    .metadata()
    .map_err(|e| PublishError::OpenSource {
      path: source.to_path_buf(),
      source: e,
    })?
    .permissions();
  write_atomically(&mut reader, destination, Some(permissions), File::sync_all)
}

/// Stream `reader` into `destination` atomically.
///
/// On any failure after the temporary file has been created it is removed
/// before the error is returned, and `destination` is left untouched. The
/// file keeps the temporary file's owner-only mode.
pub fn atomic_write_from<R: Read>(reader: &mut R, destination: &Path) -> Result<(), PublishError> {
  write_atomically(reader, destination, None, File::sync_all)
}

/// `sync` flushes the temporary file to disk before the rename.
fn write_atomically<R: Read>(
  reader: &mut R,
  destination: &Path,
  permissions: Option<Permissions>,
  sync: fn(&File) -> io::Result<()>,
) -> Result<(), PublishError> {
  let temp_path = temp_path_for(destination);

  let file = create_temp(&temp_path).map_err(|e| PublishError::CreateTemp {
    path: temp_path.clone(),
    source: e,
  })?;

  let result = write_synced(reader, file, &temp_path, permissions, sync).and_then(|()| {
    fs::rename(&temp_path, destination).map_err(|e| PublishError::Rename {
      path: destination.to_path_buf(),
      source: e,
    })
  });

  if result.is_err()
    && let Err(e) = fs::remove_file(&temp_path)
    && e.kind() != io::ErrorKind::NotFound
  {
    warn!(path = %temp_path.display(), error = %e, "failed to remove temporary file");
  }

  result
}

/// Copy into `file`, apply `permissions`, sync it to disk, and close it.
fn write_synced<R: Read>(
  reader: &mut R,
  mut file: File,
  temp_path: &Path,
  permissions: Option<Permissions>,
  sync: fn(&File) -> io::Result<()>,
) -> Result<(), PublishError> {
  let copied = io::copy(reader, &mut file).map_err(|e| PublishError::Copy {
    path: temp_path.to_path_buf(),
    source: e,
  })?;
  debug!(bytes = copied, path = %temp_path.display(), "copied into temp file");

  if let Some(permissions) = permissions {
    file.set_permissions(permissions).map_err(|e| PublishError::Permissions {
      path: temp_path.to_path_buf(),
      source: e,
    })?;
  }

  sync(&file).map_err(|e| PublishError::Sync {
    path: temp_path.to_path_buf(),
    source: e,
  })?;

  drop(file);
  Ok(())
}

/// Create the temporary file, replacing any stale one left by an earlier run.
///
/// A leftover entry is unlinked rather than opened, so a symlink planted at
/// the temporary path is removed instead of followed.
fn create_temp(path: &Path) -> io::Result<File> {
  match fs::remove_file(path) {
    Ok(()) => debug!(path = %path.display(), "removed stale temporary file"),
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(e),
  }
  open_new(path)
}

#[cfg(unix)]
fn open_new(path: &Path) -> io::Result<File> {
  use std::os::unix::fs::OpenOptionsExt;

  OpenOptions::new().write(true).create_new(true).mode(0o600).open(path)
}

#[cfg(not(unix))]
fn open_new(path: &Path) -> io::Result<File> {
  OpenOptions::new().write(true).create_new(true).open(path)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::manifest::ProjectManifest;
  use crate::pipeline::BuildOptions;
  use tempfile::TempDir;

  fn context(root: &Path, options: BuildOptions) -> PipelineContext {
    PipelineContext {
      options,
      project_root: root.to_path_buf(),
      manifest: ProjectManifest {
        name: "clicker".to_string(),
        version: "1.2.3".to_string(),
      },
      tool: PathBuf::from("cargo"),
    }
  }

  fn write_binary(root: &Path, size: usize) -> PathBuf {
    let dir = root.join(RELEASE_DIR);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("clicker{}", exe_extension()));
    let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    fs::write(&path, content).unwrap();
    path
  }

  /// Yields `good` bytes, then fails.
  struct FailingReader {
    good: usize,
  }

  impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
      if self.good == 0 {
        return Err(io::Error::other("simulated disk failure"));
      }
      let n = buf.len().min(self.good);
      buf[..n].fill(0xAB);
      self.good -= n;
      Ok(n)
    }
  }

  #[test]
  fn destination_filename_is_version_stamped() {
    assert_eq!(
      destination_filename("clicker", "1.2.3"),
      format!("clicker-v1.2.3{}", exe_extension())
    );
  }

  #[test]
  fn temp_path_is_a_sibling_with_suffix() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("clicker-v1.2.3");

    let tmp = temp_path_for(&dest);

    assert_eq!(tmp.parent(), dest.parent());
    assert_eq!(tmp.file_name().unwrap(), "clicker-v1.2.3.tmp");
  }

  #[test]
  fn output_dir_defaults_to_release_dir() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path(), BuildOptions::default());

    assert_eq!(output_dir(&ctx), temp.path().join(RELEASE_DIR));
  }

  #[test]
  fn relative_output_dir_resolves_against_project_root() {
    let temp = TempDir::new().unwrap();
    let options = BuildOptions {
      output_dir: Some(PathBuf::from("dist")),
      ..Default::default()
    };
    let ctx = context(temp.path(), options);

    assert_eq!(output_dir(&ctx), temp.path().join("dist"));
  }

  #[test]
  fn locate_binary_finds_conventional_path() {
    let temp = TempDir::new().unwrap();
    let binary = write_binary(temp.path(), 10);
    let ctx = context(temp.path(), BuildOptions::default());

    assert_eq!(locate_binary(&ctx).unwrap(), binary);
  }

  #[test]
  fn locate_binary_does_not_search_subdirectories() {
    let temp = TempDir::new().unwrap();
    let nested = temp.path().join(RELEASE_DIR).join("deps");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join(format!("clicker{}", exe_extension())), b"x").unwrap();
    let ctx = context(temp.path(), BuildOptions::default());

    let err = locate_binary(&ctx).unwrap_err();

    assert!(matches!(err, PublishError::BinaryNotFound { .. }));
  }

  #[test]
  fn publish_default_location_matches_scenario() {
    let temp = TempDir::new().unwrap();
    let binary = write_binary(temp.path(), 5000);
    let ctx = context(temp.path(), BuildOptions::default());

    let outcome = publish(&ctx, &binary).unwrap();

    let expected = temp
      .path()
      .join(RELEASE_DIR)
      .join(format!("clicker-v1.2.3{}", exe_extension()));
    assert_eq!(outcome.destination, expected);
    assert_eq!(outcome.bytes, Some(5000));
    assert!(!outcome.dry_run);
    assert_eq!(fs::read(&expected).unwrap(), fs::read(&binary).unwrap());
    assert!(!temp_path_for(&expected).exists());
  }

  #[test]
  fn publish_creates_missing_output_dirs() {
    let temp = TempDir::new().unwrap();
    let binary = write_binary(temp.path(), 64);
    let out = temp.path().join("dist").join("nightly");
    let options = BuildOptions {
      output_dir: Some(out.clone()),
      ..Default::default()
    };
    let ctx = context(temp.path(), options);

    let outcome = publish(&ctx, &binary).unwrap();

    assert_eq!(outcome.destination.parent(), Some(out.as_path()));
    assert_eq!(fs::metadata(&outcome.destination).unwrap().len(), 64);
  }

  #[test]
  fn publish_replaces_previous_file() {
    let temp = TempDir::new().unwrap();
    let binary = write_binary(temp.path(), 300);
    let ctx = context(temp.path(), BuildOptions::default());
    let dest = output_dir(&ctx).join(destination_filename("clicker", "1.2.3"));
    fs::write(&dest, b"stale").unwrap();

    publish(&ctx, &binary).unwrap();

    assert_eq!(fs::read(&dest).unwrap(), fs::read(&binary).unwrap());
  }

  #[test]
  #[tracing_test::traced_test]
  fn dry_run_touches_nothing() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("clicker");
    fs::write(&source, b"bin").unwrap();
    let out = temp.path().join("dist");
    let options = BuildOptions {
      output_dir: Some(out.clone()),
      dry_run: true,
      ..Default::default()
    };
    let ctx = context(temp.path(), options);

    let outcome = publish(&ctx, &source).unwrap();

    assert!(outcome.dry_run);
    assert_eq!(outcome.bytes, None);
    assert!(!out.exists());
    assert!(!outcome.destination.exists());
    assert!(logs_contain("[DRY-RUN] Would copy"));
  }

  #[test]
  fn interrupted_copy_removes_temp_and_keeps_destination() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("clicker-v1.2.3");
    fs::write(&dest, b"previous release").unwrap();

    let err = atomic_write_from(&mut FailingReader { good: 20_000 }, &dest).unwrap_err();

    assert!(matches!(err, PublishError::Copy { .. }));
    assert!(!temp_path_for(&dest).exists());
    assert_eq!(fs::read(&dest).unwrap(), b"previous release");
  }

  #[test]
  fn interrupted_copy_without_previous_file_leaves_nothing() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("clicker-v1.2.3");

    atomic_write_from(&mut FailingReader { good: 0 }, &dest).unwrap_err();

    assert!(!dest.exists());
    assert!(!temp_path_for(&dest).exists());
  }

  #[test]
  fn failed_rename_removes_temp() {
    let temp = TempDir::new().unwrap();
    // A non-empty directory at the destination makes the rename fail.
    let dest = temp.path().join("clicker-v1.2.3");
    fs::create_dir(&dest).unwrap();
    fs::write(dest.join("keep"), b"x").unwrap();

    let err = atomic_write_from(&mut &b"payload"[..], &dest).unwrap_err();

    assert!(matches!(err, PublishError::Rename { .. }));
    assert!(!temp_path_for(&dest).exists());
    assert!(dest.join("keep").exists());
  }

  #[test]
  fn missing_source_creates_no_temp() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("clicker-v1.2.3");

    let err = atomic_copy(&temp.path().join("missing"), &dest).unwrap_err();

    assert!(matches!(err, PublishError::OpenSource { .. }));
    assert!(!temp_path_for(&dest).exists());
  }

  #[test]
  fn missing_output_parent_is_create_temp_error() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("no-such-dir").join("clicker-v1.2.3");

    let err = atomic_write_from(&mut &b"payload"[..], &dest).unwrap_err();

    assert!(matches!(err, PublishError::CreateTemp { .. }));
  }

  #[cfg(unix)]
  #[test]
  fn atomic_copy_preserves_source_mode() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let source = temp.path().join("clicker");
    fs::write(&source, b"#!/bin/sh\n").unwrap();
    fs::set_permissions(&source, fs::Permissions::from_mode(0o755)).unwrap();
    let dest = temp.path().join("clicker-v1.2.3");

    atomic_copy(&source, &dest).unwrap();

    let mode = fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o755);
  }

  #[cfg(unix)]
  #[test]
  fn streamed_file_keeps_restrictive_temp_mode() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("clicker-v1.2.3");

    atomic_write_from(&mut &b"payload"[..], &dest).unwrap();

    let mode = fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
  }

  #[test]
  fn failed_sync_removes_temp_and_keeps_destination() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("clicker-v1.2.3");
    fs::write(&dest, b"previous release").unwrap();

    let err = write_atomically(&mut &b"payload"[..], &dest, None, |_| {
      Err(io::Error::other("simulated fsync failure"))
    })
    .unwrap_err();

    assert!(matches!(err, PublishError::Sync { .. }));
    assert!(!temp_path_for(&dest).exists());
    assert_eq!(fs::read(&dest).unwrap(), b"previous release");
  }

  #[test]
  fn failed_stat_after_rename_is_reported() {
    let temp = TempDir::new().unwrap();
    let binary = write_binary(temp.path(), 128);
    let ctx = context(temp.path(), BuildOptions::default());

    let err = publish_with(&ctx, &binary, |_| Err(io::Error::other("simulated stat failure"))).unwrap_err();

    let dest = output_dir(&ctx).join(destination_filename("clicker", "1.2.3"));
    assert!(matches!(err, PublishError::Stat { ref path, .. } if *path == dest));
    assert_eq!(fs::read(&dest).unwrap(), fs::read(&binary).unwrap());
    assert!(!temp_path_for(&dest).exists());
  }

  #[test]
  fn stale_temp_file_is_replaced() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("clicker-v1.2.3");
    fs::write(temp_path_for(&dest), b"leftover from a crashed run, longer than the payload").unwrap();

    atomic_write_from(&mut &b"payload"[..], &dest).unwrap();

    assert_eq!(fs::read(&dest).unwrap(), b"payload");
    assert!(!temp_path_for(&dest).exists());
  }

  #[cfg(unix)]
  #[test]
  fn symlink_at_temp_path_is_not_followed() {
    let temp = TempDir::new().unwrap();
    let outside = temp.path().join("outside");
    fs::write(&outside, b"do not touch").unwrap();
    let out_dir = temp.path().join("dist");
    fs::create_dir(&out_dir).unwrap();
    let dest = out_dir.join("clicker-v1.2.3");
    std::os::unix::fs::symlink(&outside, temp_path_for(&dest)).unwrap();

    atomic_write_from(&mut &b"payload"[..], &dest).unwrap();

    assert_eq!(fs::read(&outside).unwrap(), b"do not touch");
    assert_eq!(fs::read(&dest).unwrap(), b"payload");
    assert!(!fs::symlink_metadata(&dest).unwrap().file_type().is_symlink());
  }
}
