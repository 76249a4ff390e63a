//! HTTP fetcher for retailer listing pages
//!
//! One client per run: session cookies persist across requests, a
//! User-Agent is drawn from the configured pool on every attempt, and a
//! shared rate limiter caps the request rate on top of the per-attempt
//! politeness delay.

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{clock::DefaultClock, state::{direct::NotKeyed, InMemoryState}, Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, USER_AGENT};
use reqwest::Client;
use scraper::{Html, Selector};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::services::{FetchPolicy, FetchedPage, Fetcher};
use crate::infrastructure::config::{defaults, FetcherConfig};
use crate::infrastructure::parsing_error::ParsingError;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Fetcher backed by a cookie-keeping reqwest client
pub struct HttpFetcher {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: FetcherConfig,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second).context("Rate limit must be greater than 0")?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            config,
        })
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// A random entry from the pool, or the first built-in agent when the pool is empty
    fn pick_user_agent(&self) -> &str {
        if self.config.user_agents.is_empty() {
            return defaults::USER_AGENTS[0];
        }
        let index = fastrand::usize(..self.config.user_agents.len());
        &self.config.user_agents[index]
    }

    /// One request. A response without body content fails with
    /// [`ParsingError::ContentValidationFailed`].
    async fn attempt(&self, url: &str) -> Result<String> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.pick_user_agent())
            .send()
            .await
            .with_context(|| format!("Failed to fetch URL: {url}"))?;

        if !response.status().is_success() {
            return Err(ParsingError::HttpRequestFailed {
                status: response.status().as_u16(),
                url: url.to_string(),
            }
            .into());
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from: {url}"))?;

        if body.len() < self.config.small_body_warning_bytes {
            warn!("Suspicious small response size: {} bytes from {}", body.len(), url);
        }

        if !has_body_content(&body) {
            return Err(ParsingError::ContentValidationFailed {
                reason: format!("no body content in response from {url}"),
                content_length: body.len(),
            }
            .into());
        }
        Ok(body)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, policy: &FetchPolicy) -> Option<FetchedPage> {
        let attempts = policy.max_retries.max(1);

        for attempt in 0..attempts {
            info!("Fetching: {} (attempt {}/{})", url, attempt + 1, attempts);
            tokio::time::sleep(policy.delay).await;

            match self.attempt(url).await {
                Ok(html) => {
                    debug!("Fetched {} ({} bytes)", url, html.len());
                    return Some(FetchedPage {
                        url: url.to_string(),
                        html,
                    });
                }
                Err(e) if is_empty_document(&e) => {
                    // retried without extra backoff
                    warn!("{:#}", e);
                }
                Err(e) if !is_retryable(&e) => {
                    warn!("Giving up on {}: {:#}", url, e);
                    return None;
                }
                Err(e) => {
                    warn!("Request error (attempt {}): {:#}", attempt + 1, e);
                    if attempt + 1 < attempts {
                        tokio::time::sleep(policy.backoff(attempt)).await;
                    }
                }
            }
        }

        warn!("Failed to fetch {} after {} attempts", url, attempts);
        None
    }
}

fn is_empty_document(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<ParsingError>(),
        Some(ParsingError::ContentValidationFailed { .. })
    )
}

/// Transport errors are always retried; typed failures only when recoverable
fn is_retryable(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ParsingError>()
        .is_none_or(ParsingError::is_recoverable)
}

/// True when the document's body holds any element or non-blank text.
///
/// The HTML parser always synthesizes a `<body>`, so an empty one is what
/// "no body" looks like.
pub fn has_body_content(html: &str) -> bool {
    let Ok(body_selector) = Selector::parse("body") else {
        return false;
    };
    let document = Html::parse_document(html);
    document.select(&body_selector).next().is_some_and(|body| {
        body.children().any(|child| child.value().is_element()) || body.text().any(|t| !t.trim().is_empty())
    })
}
