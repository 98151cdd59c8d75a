//! Configuration loading, sink configuration types, and validation.
//!
//! Config files: `kvnts.toml`, `kvnts.yaml`, or `kvnts.json`
//! Searched in `./` then `~/.config/kvnts/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in all values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod sink;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        AssistantConfig, CacheConfig, DispatchConfig, FailurePolicy, KvntsConfig, LokiConfig,
    },
    sink::{MattermostConfig, SinkConfig, SinkEntry, SinkType, SlackConfig, TeamsConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
