//! Configuration management.
//!
//! Settings follow a precedence chain: defaults, then a TOML/JSON file,
//! then `COBROWSE_*` environment variables, then CLI arguments.

pub mod settings;

pub use settings::{CliArgs, ConfigError, ServerSettings};
