//! Parsing and validation of `weft.toml` fabric configuration files.
//!
//! This crate reads a project's fabric description and produces a
//! strongly-typed [`FabricConfig`]: grid and track parameters, the
//! configuration bus, pipeline registers, core library, per-tile layout and
//! global-signal wiring.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::{resolve_core, ResolvedCore};
pub use types::*;
