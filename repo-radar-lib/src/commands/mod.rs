//! Command-line interface and orchestration for repo-radar
//!
//! This module implements the CLI commands and wires the other modules together into
//! an end-to-end tracking run. It handles argument parsing, configuration management,
//! logging setup, and the console summary.
//!
//! ## Commands
//!
//! - **track**: Run one fetch cycle, update the persisted project table, and write the
//!   day's report
//! - **init**: Generate a default configuration file
//! - **validate**: Check a configuration file for syntax and value errors
//!
//! The `run` function parses command-line arguments using clap and routes to the
//! appropriate command handler. Configuration lives in a TOML file, by default
//! `repo-radar.toml` in the data directory, and every key has a built-in default
//! except the keyword list.

mod config;
mod data_dir;
mod host;
mod init;
mod logging;
mod run;
mod track;
mod validate;

pub use config::{CONFIG_FILE_NAME, Config, DEFAULT_CONFIG_TOML};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use logging::LogLevel;
pub use run::run;
pub use track::{TrackArgs, track};
pub use validate::{ValidateArgs, validate_config};
