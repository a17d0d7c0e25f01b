//! relstamp-lib: build a Cargo project in release mode and publish a
//! version-stamped copy of its binary.
//!
//! The pipeline is split into stages, each with its own error type:
//! - `manifest`: find the project root and read `[package]` name/version
//! - `tool`: locate and sanity-check the `cargo` executable
//! - `build`: run `cargo clean` / `cargo build --release` as subprocesses
//! - `publish`: copy the release binary into place atomically
//! - `pipeline`: wires the stages together and classifies failures

pub mod build;
pub mod consts;
pub mod manifest;
pub mod pipeline;
pub mod platform;
pub mod publish;
pub mod tool;
pub mod util;

pub use pipeline::{BuildOptions, PipelineContext, PipelineError, PipelineReport, run};
