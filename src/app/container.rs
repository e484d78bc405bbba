use std::sync::Arc;

use crate::app::session::SessionOrchestrator;
use crate::config_initialization::AppConfig;
use crate::domain::errors::ConfigError;
use crate::engine::{EngineSlot, FfmpegLoader};
use crate::output::{DriveAccess, SinkEnvironment};
use crate::ports::{DownloadHost, MediaResolver, SessionObserver};
use crate::resolver::UrlResolver;

/// Wires the adapters for one process from the effective configuration
pub struct AppContainer {
    config: AppConfig,
    http: reqwest::Client,
    engine: Arc<EngineSlot>,
    resolver: Arc<UrlResolver>,
}

impl AppContainer {
    pub fn new(config: AppConfig) -> Result<Self, ConfigError> {
        let http = config
            .network
            .build_client()
            .map_err(|e| ConfigError::Invalid(format!("cannot build HTTP client: {}", e)))?;
        let resolver = UrlResolver::from_config(&config.network)
            .map_err(|e| ConfigError::Invalid(format!("cannot build HTTP client: {}", e)))?;
        let engine = EngineSlot::new(Arc::new(FfmpegLoader::new(config.engine.clone())));

        Ok(Self {
            config,
            http,
            engine: Arc::new(engine),
            resolver: Arc::new(resolver),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Drive access for folder picking; validates credentials and token
    pub fn drive_access(&self, access_token: Option<String>) -> Result<DriveAccess, ConfigError> {
        DriveAccess::new(self.http.clone(), self.config.google.clone(), access_token)
    }

    /// A fresh session sharing this container's engine slot
    pub fn session(
        &self,
        access_token: Option<String>,
        download_host: Arc<dyn DownloadHost>,
        observer: Arc<dyn SessionObserver>,
    ) -> SessionOrchestrator {
        let sinks = SinkEnvironment {
            download_host,
            http: self.http.clone(),
            google: self.config.google.clone(),
            access_token,
        };
        SessionOrchestrator::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.resolver) as Arc<dyn MediaResolver>,
            sinks,
            observer,
        )
    }
}
