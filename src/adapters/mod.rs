// Adapters - External system implementations

pub mod toml_config;
pub mod tracing_log;

// Re-export adapters
pub use toml_config::TomlConfigStore;
pub use tracing_log::TracingObserver;
