pub mod paths;

/// Executable extension of the platform this binary was compiled for
/// (`.exe` on Windows, empty elsewhere).
pub fn exe_extension() -> &'static str {
  std::env::consts::EXE_SUFFIX
}
