//! Configuration system for Docent.
//!
//! Provides TOML-based configuration with:
//! - one section per concern (`[llm]`, `[tools]`, `[compaction]`, `[session]`, `[logging]`)
//! - layering of user, project-local and explicit files
//! - environment overrides for endpoints, model and API key
//! - validation of values the runtime depends on

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadOptions, LoadedConfig, load_config, load_config_file,
    load_config_with_options, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
