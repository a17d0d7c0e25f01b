use std::io;
use std::path::{Path, PathBuf};

/// Returns true unless the filesystem reports that `path` does not exist.
///
/// Probe failures other than "not found" (permission denied, for instance)
/// count as present, so callers surface the real error when they open the
/// path instead of silently skipping past it.
pub fn exists(path: &Path) -> bool {
  match std::fs::metadata(path) {
    Ok(_) => true,
    Err(e) => e.kind() != io::ErrorKind::NotFound,
  }
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
  if path.is_absolute() {
    path.to_path_buf()
  } else {
    base.join(path)
  }
}

/// Resolve `path` against the process's current directory.
pub fn absolute_from_cwd(path: &Path) -> io::Result<PathBuf> {
  if path.is_absolute() {
    return Ok(path.to_path_buf());
  }
  Ok(std::env::current_dir()?.join(path))
}
