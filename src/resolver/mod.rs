//! URL resolution: turns a user supplied link into an in-memory media file
//!
//! The resolver is a bounded state machine. Each fallback chain makes at most
//! [`MAX_EXTRACTION_DEPTH`] extraction calls (the link itself, then its
//! original-domain form), so every path terminates after a fixed number of
//! network round trips.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::errors::{FetchError, ResolutionError};
use crate::domain::model::MediaFile;
use crate::domain::rules::{
    apply_mirror_rewrite, derive_media_filename, has_mirror_marker, is_social_link,
    is_video_content_type, restore_original_domain, MIN_MEDIA_BYTES,
};
use crate::engine::progress::Reporter;
use crate::ports::MediaResolver;

pub mod extractor;
pub mod fetcher;

pub use extractor::SocialExtractor;
pub use fetcher::{FetchStrategy, FetchedResponse, StrategyFetcher};

/// Extraction calls allowed in one fallback chain
pub const MAX_EXTRACTION_DEPTH: u8 = 2;

/// Network endpoints and limits used while resolving links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Social extraction API endpoint
    pub extractor_endpoint: String,
    /// First rewrite proxy, the encoded URL is appended
    pub primary_proxy: String,
    /// Second rewrite proxy, the encoded URL is appended
    pub secondary_proxy: String,
    /// Whole-request timeout, including the body download
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            extractor_endpoint: "https://api.cobalt.tools/api/json".to_string(),
            primary_proxy: "https://corsproxy.io/?".to_string(),
            secondary_proxy: "https://api.allorigins.win/raw?url=".to_string(),
            timeout_seconds: 600,
            connect_timeout_seconds: 15,
            user_agent: format!("framecut/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl NetworkConfig {
    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_seconds))
            .connect_timeout(Duration::from_secs(self.connect_timeout_seconds))
            .user_agent(self.user_agent.clone())
            .build()
    }
}

/// Which chain an extraction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractionChain {
    /// Link classified as social up front
    Initial,
    /// Second chance after a fetch landed on a web page
    SecondChance,
}

/// Where a fetch target came from, which decides how a failure is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOrigin {
    /// Link fetched as given, no extraction succeeded yet
    Plain,
    /// Target produced by the initial extraction
    Extracted,
    /// Target produced by a second-chance extraction at `depth`
    SecondChance { depth: u8 },
}

#[derive(Debug)]
enum Phase {
    Extract {
        candidate: String,
        chain: ExtractionChain,
        depth: u8,
    },
    Fetch {
        target: String,
        origin: FetchOrigin,
    },
}

/// Composes the strategy fetcher and social extractor
pub struct UrlResolver {
    fetcher: StrategyFetcher,
    extractor: SocialExtractor,
}

impl UrlResolver {
    pub fn new(fetcher: StrategyFetcher, extractor: SocialExtractor) -> Self {
        Self { fetcher, extractor }
    }

    pub fn from_config(config: &NetworkConfig) -> Result<Self, reqwest::Error> {
        let client = config.build_client()?;
        Ok(Self::new(
            StrategyFetcher::from_config(client.clone(), config),
            SocialExtractor::new(client, config.extractor_endpoint.clone()),
        ))
    }

    /// Resolve `raw_url` into a media file
    pub async fn resolve_url(
        &self,
        raw_url: &str,
        reporter: &Reporter,
    ) -> Result<MediaFile, ResolutionError> {
        let original = raw_url.trim().to_string();
        if original.is_empty() {
            return Err(ResolutionError::new("no URL given"));
        }

        let normalized = apply_mirror_rewrite(&original);
        if normalized != original {
            reporter.info(format!("Rewrote link to mirror domain: {}", normalized));
        }

        reporter.info(format!("Resolving link: {}", normalized));
        let mut phase = if is_social_link(&normalized) {
            reporter.info("Social link detected, looking up the direct video link...");
            Phase::Extract {
                candidate: normalized.clone(),
                chain: ExtractionChain::Initial,
                depth: 1,
            }
        } else {
            Phase::Fetch {
                target: normalized.clone(),
                origin: FetchOrigin::Plain,
            }
        };

        let fetched = loop {
            debug!(?phase, "Resolver step");
            phase = match phase {
                Phase::Extract {
                    candidate,
                    chain,
                    depth,
                } => match self.extractor.extract(&candidate).await {
                    Ok(direct) => {
                        reporter.success("Found the direct video link");
                        info!(%candidate, %direct, "Extraction succeeded");
                        Phase::Fetch {
                            target: direct,
                            origin: match chain {
                                ExtractionChain::Initial => FetchOrigin::Extracted,
                                ExtractionChain::SecondChance => FetchOrigin::SecondChance { depth },
                            },
                        }
                    }
                    Err(e) => {
                        warn!(%candidate, error = %e, "Extraction failed");
                        let retry = depth < MAX_EXTRACTION_DEPTH && has_mirror_marker(&candidate);
                        match (chain, retry) {
                            (_, true) => {
                                reporter.warn(format!(
                                    "Mirror link not supported by extraction ({}), retrying with the original domain",
                                    e
                                ));
                                Phase::Extract {
                                    candidate: restore_original_domain(&candidate),
                                    chain,
                                    depth: depth + 1,
                                }
                            }
                            (ExtractionChain::Initial, false) => {
                                reporter.warn(format!(
                                    "Could not look up the video link ({}), trying a direct download",
                                    e
                                ));
                                Phase::Fetch {
                                    target: original.clone(),
                                    origin: FetchOrigin::Plain,
                                }
                            }
                            (ExtractionChain::SecondChance, false) => {
                                return Err(ResolutionError::no_direct_media());
                            }
                        }
                    }
                },
                Phase::Fetch { target, origin } => {
                    match self.fetcher.fetch_with_fallback(&target, reporter).await {
                        Ok(fetched) => break fetched,
                        Err(e) => self.after_failed_fetch(e, origin, &normalized, reporter)?,
                    }
                }
            };
        };

        self.materialize(fetched, reporter).await
    }

    /// Decide the next phase after a failed fetch
    fn after_failed_fetch(
        &self,
        error: FetchError,
        origin: FetchOrigin,
        normalized: &str,
        reporter: &Reporter,
    ) -> Result<Phase, ResolutionError> {
        match (origin, error) {
            // Second chance path: also covers links the domain heuristic missed
            (FetchOrigin::Plain, FetchError::HtmlPageDetected) => {
                reporter.info("This link is a web page, looking for a video inside it...");
                Ok(Phase::Extract {
                    candidate: normalized.to_string(),
                    chain: ExtractionChain::SecondChance,
                    depth: 1,
                })
            }
            (FetchOrigin::Extracted, FetchError::HtmlPageDetected) => Err(ResolutionError::new(
                "server returned a web page instead of a media file",
            )),
            (FetchOrigin::Plain, other) | (FetchOrigin::Extracted, other) => {
                Err(ResolutionError::new(other.to_string()))
            }
            (FetchOrigin::SecondChance { depth }, error) => {
                if depth < MAX_EXTRACTION_DEPTH && has_mirror_marker(normalized) {
                    reporter.info(format!(
                        "Extracted link failed ({}), retrying with the original domain",
                        error
                    ));
                    Ok(Phase::Extract {
                        candidate: restore_original_domain(normalized),
                        chain: ExtractionChain::SecondChance,
                        depth: depth + 1,
                    })
                } else {
                    Err(ResolutionError::no_direct_media())
                }
            }
        }
    }

    /// Read the body of a successful response into memory
    async fn materialize(
        &self,
        fetched: FetchedResponse,
        reporter: &Reporter,
    ) -> Result<MediaFile, ResolutionError> {
        let content_type = fetched.content_type.clone();
        if content_type.is_some() && !is_video_content_type(content_type.as_deref()) {
            reporter.warn(format!(
                "Downloaded file has type {}, it may not be processable",
                content_type.as_deref().unwrap_or_default()
            ));
        }

        reporter.info("Downloading video into memory...");
        let body = fetched
            .response
            .bytes()
            .await
            .map_err(|e| ResolutionError::new(format!("download interrupted: {}", e)))?;

        if body.len() < MIN_MEDIA_BYTES {
            return Err(ResolutionError::too_small(body.len()));
        }

        let name = derive_media_filename(&fetched.requested_url, Utc::now().timestamp_millis());
        info!(
            %name,
            strategy = %fetched.strategy,
            bytes = body.len(),
            "Resolved link to media"
        );
        Ok(MediaFile::new(name, body.to_vec()))
    }
}

#[async_trait]
impl MediaResolver for UrlResolver {
    async fn resolve(
        &self,
        raw_url: &str,
        reporter: &Reporter,
    ) -> Result<MediaFile, ResolutionError> {
        self.resolve_url(raw_url, reporter).await
    }
}
