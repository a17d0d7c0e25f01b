//! Manifest completeness and the filename policy for version strings.
//!
//! The version ends up inside the published file name, so it must not be
//! able to introduce path separators or characters Windows refuses in names.

use thiserror::Error;

use super::ProjectManifest;

/// Characters rejected in a version string: path separators plus the
/// characters Windows reserves in file names, and NUL.
pub const FORBIDDEN_VERSION_CHARS: &[char] = &['/', '\\', ':', '"', '<', '>', '|', '?', '*', '\0'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("package.name is empty in Cargo.toml")]
  EmptyName,

  #[error("package.version is empty in Cargo.toml")]
  EmptyVersion,

  #[error("version contains forbidden character {found:?}: {version:?}")]
  ForbiddenCharacter { version: String, found: char },

  #[error("version contains control character {found:?}: {version:?}")]
  ControlCharacter { version: String, found: char },
}

impl ValidationError {
  /// True for errors about the shape of the version string rather than missing fields.
  pub fn is_version_format(&self) -> bool {
    matches!(
      self,
      ValidationError::ForbiddenCharacter { .. } | ValidationError::ControlCharacter { .. }
    )
  }
}

/// Check that both package fields are present.
pub fn validate(manifest: &ProjectManifest) -> Result<(), ValidationError> {
  if manifest.name.is_empty() {
    return Err(ValidationError::EmptyName);
  }
  if manifest.version.is_empty() {
    return Err(ValidationError::EmptyVersion);
  }
  Ok(())
}

/// Check that `version` is safe to embed in a file name.
///
/// Reserved characters are reported before control characters.
pub fn validate_version_string(version: &str) -> Result<(), ValidationError> {
  if version.is_empty() {
    return Err(ValidationError::EmptyVersion);
  }

  if let Some(found) = version.chars().find(|c| FORBIDDEN_VERSION_CHARS.contains(c)) {
    return Err(ValidationError::ForbiddenCharacter {
      version: version.to_string(),
      found,
    });
  }

  if let Some(found) = version.chars().find(|&c| (c as u32) < 32 || c as u32 == 127) {
    return Err(ValidationError::ControlCharacter {
      version: version.to_string(),
      found,
    });
  }

  Ok(())
}
