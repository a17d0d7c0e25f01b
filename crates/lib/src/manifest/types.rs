use std::io;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while locating or reading the project manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
  /// No manifest in the start directory or any of its ancestors.
  #[error("Cargo.toml not found in {} or any parent directory", start.display())]
  ProjectNotFound { start: PathBuf },

  /// The start directory could not be resolved.
  #[error("failed to resolve start directory {}: {source}", path.display())]
  StartDir { path: PathBuf, source: io::Error },

  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error("failed to parse {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: Box<toml::de::Error>,
  },
}

/// Package identity read from `[package]`.
///
/// Missing keys deserialize to empty strings; [`super::validate`] rejects them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectManifest {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub version: String,
}

/// Top-level manifest document. Every table other than `[package]` is ignored.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ManifestDocument {
  #[serde(default)]
  pub package: ProjectManifest,
}
