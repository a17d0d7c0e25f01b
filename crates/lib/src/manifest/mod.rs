//! Project discovery and manifest parsing.
//!
//! The project root is the nearest directory, walking upward from a start
//! directory, that contains `Cargo.toml`. Only `package.name` and
//! `package.version` are read from it.

mod types;
pub mod validate;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::consts::MANIFEST_FILENAME;
use crate::platform::paths;

pub use types::{ManifestError, ProjectManifest};
pub use validate::{ValidationError, validate, validate_version_string};

use types::ManifestDocument;

/// Walk upward from `start_dir` until a directory containing `Cargo.toml` is found.
///
/// `start_dir` is canonicalized first so the walk sees real parents rather
/// than `..` components. Fails with [`ManifestError::ProjectNotFound`] once the
/// filesystem root has been checked.
pub fn locate_project_root(start_dir: &Path) -> Result<PathBuf, ManifestError> {
  let start = dunce::canonicalize(start_dir).map_err(|source| ManifestError::StartDir {
    path: start_dir.to_path_buf(),
    source,
  })?;

  let mut current = start.as_path();
  loop {
    let candidate = current.join(MANIFEST_FILENAME);
    debug!(path = %candidate.display(), "probing for manifest");
    if paths::exists(&candidate) {
      return Ok(current.to_path_buf());
    }

    match current.parent() {
      Some(parent) if parent != current => current = parent,
      _ => break,
    }
  }

  Err(ManifestError::ProjectNotFound { start })
}

/// Read `{root}/Cargo.toml` and extract the package name and version.
pub fn load_manifest(root: &Path) -> Result<ProjectManifest, ManifestError> {
  let path = root.join(MANIFEST_FILENAME);

  let content = fs::read_to_string(&path).map_err(|source| ManifestError::Read {
    path: path.clone(),
    source,
  })?;

  parse_manifest(&content).map_err(|source| ManifestError::Parse {
    path,
    source: Box::new(source),
  })
}

/// Parse manifest text. Tables other than `[package]` are ignored.
pub fn parse_manifest(content: &str) -> Result<ProjectManifest, toml::de::Error> {
  let document: ManifestDocument = toml::from_str(content)?;
  Ok(document.package)
}
