use crate::types::{FetchConfig, ResearchError, Result};
use crate::utils;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff, SystemClock};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, warn};

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    host_slots: Arc<RwLock<HashMap<String, Instant>>>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            config,
            host_slots: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// GETs `url` and returns the body as text, retrying transient failures.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        self.fetch_text_with_headers(url, &[]).await
    }

    /// Like [`Fetcher::fetch_text`], with extra request headers.
    pub async fn fetch_text_with_headers(&self, url: &str, headers: &[(&str, &str)]) -> Result<String> {
        let mut backoff = retry_backoff(Duration::from_millis(self.config.retry_delay_ms));

        let mut attempt = 0;
        loop {
            self.wait_for_host_slot(url).await;

            match self.fetch_once(url, headers).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    match backoff.next_backoff() {
                        Some(delay) => {
                            warn!("Attempt {} failed for {}: {}, retrying in {:?}", attempt, url, e, delay);
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
                Err(e) => {
                    error!("Failed to fetch {} after {} attempts: {}", url, attempt + 1, e);
                    return Err(e);
                }
            }
        }
    }

    /// GETs `url` and deserializes the JSON body.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.fetch_json_with_headers(url, &[]).await
    }

    pub async fn fetch_json_with_headers<T: DeserializeOwned>(&self, url: &str, headers: &[(&str, &str)]) -> Result<T> {
        let body = self.fetch_text_with_headers(url, headers).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_once(&self, url: &str, headers: &[(&str, &str)]) -> Result<String> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ResearchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let limit = self.config.max_body_size_mb * 1024 * 1024;
        if let Some(content_length) = response.content_length() {
            if content_length as usize > limit {
                return Err(ResearchError::BodyTooLarge {
                    url: url.to_string(),
                    size_mb: content_length as usize / (1024 * 1024),
                });
            }
        }

        let body = response.text().await?;
        if body.len() > limit {
            return Err(ResearchError::BodyTooLarge {
                url: url.to_string(),
                size_mb: body.len() / (1024 * 1024),
            });
        }

        debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body)
    }

    /// Reserves the next request slot for the URL's host under the lock, then
    /// sleeps outside it so other hosts are not held up.
    async fn wait_for_host_slot(&self, url: &str) {
        let Some(host) = utils::url::extract_host(url) else {
            return;
        };
        let min_interval = Duration::from_millis(self.config.min_host_interval_ms);

        let slot = {
            let mut slots = self.host_slots.write().await;
            let now = Instant::now();
            let slot = match slots.get(&host) {
                Some(last) if *last + min_interval > now => *last + min_interval,
                _ => now,
            };
            slots.insert(host.clone(), slot);
            slot
        };

        if slot > Instant::now() {
            debug!("Rate limiting {}: waiting {:?}", host, slot - Instant::now());
            tokio::time::sleep_until(slot).await;
        }
    }
}

/// Exponential delays starting at `initial`, doubling up to 32x. Callers cap
/// the number of attempts themselves.
pub(crate) fn retry_backoff(initial: Duration) -> ExponentialBackoff<SystemClock> {
    ExponentialBackoff {
        current_interval: initial,
        initial_interval: initial,
        max_interval: initial * 32,
        multiplier: 2.0,
        max_elapsed_time: None,
        ..Default::default()
    }
}
