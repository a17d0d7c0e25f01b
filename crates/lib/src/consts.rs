//! Fixed names shared across the pipeline.

/// Manifest file that marks a project root.
pub const MANIFEST_FILENAME: &str = "Cargo.toml";

/// Release output directory, relative to the project root.
pub const RELEASE_DIR: &str = "target/release";

/// Suffix of the transient file written next to the destination while publishing.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Executable searched for on `PATH` when no override is given.
pub const TOOL_NAME: &str = "cargo";

/// Prefix `cargo --version` prints on stdout.
pub const TOOL_VERSION_PREFIX: &str = "cargo ";
