//! Shared test fixtures: a scripted fetcher and listing-page builders

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::services::{FetchPolicy, FetchedPage, Fetcher};

/// Fetcher that serves canned pages. Unknown URLs fail like an exhausted
/// real fetch. Cooldowns are recorded instead of slept.
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
    cooldowns: Mutex<Vec<Duration>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn cooldowns(&self) -> Vec<Duration> {
        self.cooldowns.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, _policy: &FetchPolicy) -> Option<FetchedPage> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        self.pages.get(url).map(|html| FetchedPage {
            url: url.to_string(),
            html: html.clone(),
        })
    }

    async fn cooldown(&self, duration: Duration) {
        if let Ok(mut cooldowns) = self.cooldowns.lock() {
            cooldowns.push(duration);
        }
    }
}

/// URL slug for a product title
pub fn slug(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// One product container: `h3` title, `.price`, a product link and an image
pub fn product_card(class: &str, title: &str, price: &str) -> String {
    let slug = slug(title);
    format!(
        r#"<div class="{class}">
  <a href="/products/{slug}"><img src="//cdn.shop.test/{slug}.jpg" alt="{title}"></a>
  <h3>{title}</h3>
  <span class="price">{price}</span>
</div>"#
    )
}

/// A full listing document wrapping the given cards
pub fn listing_page(cards: &[String]) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>Collection</title></head><body><main class=\"collection\">{}</main></body></html>",
        cards.join("\n")
    )
}
