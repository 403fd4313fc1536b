//! # parley-config
//!
//! Configuration system for Parley. Reads from `parley.toml` and environment
//! variables; the file wins over API-key variables, explicit `PARLEY_*`
//! variables win over the file.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::ParleyConfig;
pub use schema::{
    AgentConfig, ConfigWarning, LoggingConfig, ServerConfig, ServicesConfig, TelegramConfig,
    WarningSeverity,
};
