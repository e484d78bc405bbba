//! Ordered multi-strategy fetching (direct first, then two rewrite proxies)

use std::fmt;

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crate::domain::errors::FetchError;
use crate::domain::rules::is_html_content_type;
use crate::engine::progress::Reporter;
use crate::resolver::NetworkConfig;

/// How a strategy turns the requested URL into the URL actually fetched
#[derive(Debug, Clone, PartialEq, Eq)]
enum StrategyTransform {
    Identity,
    /// Base URL followed by the percent-encoded original URL
    EncodedSuffix(String),
}

/// One network path to a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchStrategy {
    pub label: String,
    transform: StrategyTransform,
}

impl FetchStrategy {
    pub fn direct() -> Self {
        Self {
            label: "direct".to_string(),
            transform: StrategyTransform::Identity,
        }
    }

    /// A rewriting proxy that takes the encoded URL appended to `base`
    pub fn proxy(label: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            transform: StrategyTransform::EncodedSuffix(base.into()),
        }
    }

    pub fn apply(&self, url: &str) -> String {
        match &self.transform {
            StrategyTransform::Identity => url.to_string(),
            StrategyTransform::EncodedSuffix(base) => {
                let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
                format!("{}{}", base, encoded)
            }
        }
    }

    /// The fixed priority list: direct, then the two configured proxies
    pub fn default_chain(config: &NetworkConfig) -> Vec<Self> {
        vec![
            Self::direct(),
            Self::proxy("corsproxy", config.primary_proxy.clone()),
            Self::proxy("allorigins", config.secondary_proxy.clone()),
        ]
    }
}

/// What happened on one fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    HttpError(u16),
    HtmlPage,
    NetworkError(String),
}

/// Ephemeral record of a single attempt, used for log lines only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionAttempt {
    pub target: String,
    pub strategy: String,
    pub outcome: AttemptOutcome,
}

impl fmt::Display for ResolutionAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::Success => write!(f, "{}: ok", self.strategy),
            AttemptOutcome::HttpError(status) => write!(f, "{}: HTTP error {}", self.strategy, status),
            AttemptOutcome::HtmlPage => write!(f, "{}: got a web page", self.strategy),
            AttemptOutcome::NetworkError(msg) => write!(f, "{}: {}", self.strategy, msg),
        }
    }
}

/// Successful non-HTML response, body not yet read
#[derive(Debug)]
pub struct FetchedResponse {
    /// URL requested before any proxy rewrite
    pub requested_url: String,
    pub strategy: String,
    pub content_type: Option<String>,
    pub response: reqwest::Response,
}

/// Tries each strategy in order until one yields media
pub struct StrategyFetcher {
    client: reqwest::Client,
    strategies: Vec<FetchStrategy>,
}

impl StrategyFetcher {
    pub fn new(client: reqwest::Client, strategies: Vec<FetchStrategy>) -> Self {
        Self { client, strategies }
    }

    pub fn from_config(client: reqwest::Client, config: &NetworkConfig) -> Self {
        Self::new(client, FetchStrategy::default_chain(config))
    }

    /// Fetch `url`, first success wins.
    ///
    /// A 2xx HTML answer stops the loop with `HtmlPageDetected`: the URL
    /// points at a web page and needs re-resolution, not another proxy.
    pub async fn fetch_with_fallback(
        &self,
        url: &str,
        reporter: &Reporter,
    ) -> Result<FetchedResponse, FetchError> {
        let mut last_error: Option<FetchError> = None;

        for strategy in &self.strategies {
            let target = strategy.apply(url);
            debug!(strategy = %strategy.label, %target, "Fetch attempt");

            let response = match self.client.get(&target).send().await {
                Ok(response) => response,
                Err(e) => {
                    let message = describe_transport_error(&e);
                    self.record(reporter, &target, strategy, AttemptOutcome::NetworkError(message.clone()));
                    last_error = Some(FetchError::Network {
                        strategy: strategy.label.clone(),
                        message,
                    });
                    continue;
                }
            };

            let status = response.status();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            if status.is_success() {
                if is_html_content_type(content_type.as_deref()) {
                    self.record(reporter, &target, strategy, AttemptOutcome::HtmlPage);
                    return Err(FetchError::HtmlPageDetected);
                }
                self.record(reporter, &target, strategy, AttemptOutcome::Success);
                return Ok(FetchedResponse {
                    requested_url: url.to_string(),
                    strategy: strategy.label.clone(),
                    content_type,
                    response,
                });
            }

            // 401/403 usually mean hotlink protection; the next proxy may pass
            self.record(reporter, &target, strategy, AttemptOutcome::HttpError(status.as_u16()));
            last_error = Some(FetchError::Http {
                strategy: strategy.label.clone(),
                status: status.as_u16(),
            });
        }

        Err(last_error.unwrap_or(FetchError::Unreachable))
    }

    fn record(&self, reporter: &Reporter, target: &str, strategy: &FetchStrategy, outcome: AttemptOutcome) {
        let attempt = ResolutionAttempt {
            target: target.to_string(),
            strategy: strategy.label.clone(),
            outcome,
        };
        match attempt.outcome {
            AttemptOutcome::Success => debug!(target = %attempt.target, "{}", attempt),
            _ => {
                warn!(target = %attempt.target, "{}", attempt);
                reporter.info(format!("Fetch attempt failed: {}", attempt));
            }
        }
    }
}

/// Human readable reason for a transport failure
pub(crate) fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        "could not connect".to_string()
    } else {
        error.to_string()
    }
}
