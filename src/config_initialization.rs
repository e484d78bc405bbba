//! Configuration initialization and hierarchy management

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adapters::toml_config::TomlConfigStore;
use crate::domain::errors::ConfigError;
use crate::engine::EngineConfig;
use crate::output::GoogleConfig;
use crate::resolver::NetworkConfig;
use crate::utils::Utils;

/// Complete application configuration, one TOML section per concern
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub google: GoogleConfig,
    pub network: NetworkConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Copy safe to print: credentials masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.google.client_id = Utils::redact(&self.google.client_id);
        copy.google.api_key = Utils::redact(&self.google.api_key);
        copy
    }
}

/// Values given on the command line, highest precedence
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub ffmpeg_path: Option<String>,
    pub threads: Option<usize>,
    pub extractor_endpoint: Option<String>,
}

/// Build the effective configuration.
///
/// Precedence is CLI > Env > File > Defaults, except for the Google
/// credentials: values the user saved in the file win over the environment,
/// which only fills the empty ones.
pub fn initialize_configuration_hierarchy(
    store: &TomlConfigStore,
    overrides: &ConfigOverrides,
) -> Result<AppConfig, ConfigError> {
    info!("Initializing configuration hierarchy");

    let mut config = store.load()?.unwrap_or_default();
    apply_environment(&mut config, |key| std::env::var(key).ok());
    apply_cli_overrides(&mut config, overrides);

    Ok(config)
}

/// Apply `FRAMECUT_*` variables read through `lookup`
pub fn apply_environment<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let mut applied = 0;

    let credentials = [
        ("FRAMECUT_GOOGLE_CLIENT_ID", &mut config.google.client_id),
        ("FRAMECUT_GOOGLE_API_KEY", &mut config.google.api_key),
        ("FRAMECUT_GOOGLE_APP_ID", &mut config.google.app_id),
    ];
    for (key, slot) in credentials {
        if slot.is_empty() {
            if let Some(value) = lookup(key) {
                *slot = value;
                applied += 1;
            }
        }
    }

    let settings = [
        ("FRAMECUT_EXTRACTOR_ENDPOINT", &mut config.network.extractor_endpoint),
        ("FRAMECUT_PRIMARY_PROXY", &mut config.network.primary_proxy),
        ("FRAMECUT_SECONDARY_PROXY", &mut config.network.secondary_proxy),
        ("FRAMECUT_FFMPEG_PATH", &mut config.engine.ffmpeg_path),
        ("FRAMECUT_FFPROBE_PATH", &mut config.engine.ffprobe_path),
    ];
    for (key, slot) in settings {
        if let Some(value) = lookup(key) {
            *slot = value;
            applied += 1;
        }
    }

    if let Some(timeout) = lookup("FRAMECUT_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
        config.network.timeout_seconds = timeout;
        applied += 1;
    }
    if let Some(threads) = lookup("FRAMECUT_THREADS").and_then(|v| v.parse().ok()) {
        config.engine.threads = threads;
        applied += 1;
    }

    if applied > 0 {
        info!("Applied {} environment variable overrides", applied);
    }
}

fn apply_cli_overrides(config: &mut AppConfig, overrides: &ConfigOverrides) {
    if let Some(path) = &overrides.ffmpeg_path {
        config.engine.ffmpeg_path = path.clone();
    }
    if let Some(threads) = overrides.threads {
        config.engine.threads = threads;
    }
    if let Some(endpoint) = &overrides.extractor_endpoint {
        config.network.extractor_endpoint = endpoint.clone();
    }
}
