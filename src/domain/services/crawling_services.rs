//! Service seams used by the harvest pipeline

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Politeness and retry settings for one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPolicy {
    /// Wait before every attempt, including the first
    pub delay: Duration,
    pub max_retries: u32,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            max_retries: 3,
        }
    }
}

impl FetchPolicy {
    pub fn new(delay: Duration, max_retries: u32) -> Self {
        Self { delay, max_retries }
    }

    /// Backoff after a failed attempt (zero based): `delay * (attempt + 1)`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.delay.saturating_mul(attempt.saturating_add(1))
    }
}

/// A fetched listing page.
///
/// The document is kept as text; parsing happens synchronously in the
/// extraction engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
}

/// Retrieves listing pages.
///
/// `None` means every attempt failed. Transport errors, non-success status
/// and documents without a body element all count as failed attempts.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, policy: &FetchPolicy) -> Option<FetchedPage>;

    /// Pause between harvest units
    async fn cooldown(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
