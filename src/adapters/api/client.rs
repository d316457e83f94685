//! Venue HTTP Client - Rate-limited REST API Client
//!
//! Wraps reqwest with client-side rate limiting, a concurrency cap,
//! retries with exponential backoff, and optional API-key auth for
//! every REST venue connector. Failures come back as `TradingError`
//! so connectors can hand them to the orchestrator unchanged.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{Credential, HttpConfig};
use crate::domain::{TradingError, TradingResult};

/// Header carrying the venue API key.
const API_KEY_HEADER: &str = "x-api-key";

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Configuration for the venue HTTP client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
  /// Venue name used in errors and logs.
  pub source_name: String,
  /// Base URL for the venue API.
  pub base_url: String,
  /// Request timeout.
  pub timeout: Duration,
  /// Maximum concurrent requests.
  pub max_concurrent: usize,
  /// Maximum retries on transient errors.
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff).
  pub retry_base_delay: Duration,
  /// Client-side request budget.
  pub requests_per_second: u32,
  /// Optional API key.
  pub api_key: Option<Credential>,
}

impl HttpClientConfig {
  pub fn new(source_name: impl Into<String>, base_url: impl Into<String>, http: &HttpConfig) -> Self {
    Self {
      source_name: source_name.into(),
      base_url: base_url.into(),
      timeout: Duration::from_secs(http.timeout_seconds),
      max_concurrent: http.max_concurrent,
      max_retries: http.max_retries,
      retry_base_delay: Duration::from_millis(http.retry_base_delay_ms),
      requests_per_second: http.requests_per_second,
      api_key: None,
    }
  }

  #[must_use]
  pub fn with_api_key(mut self, api_key: Option<Credential>) -> Self {
    self.api_key = api_key;
    self
  }
}

/// Rate-limited HTTP client for a venue REST API.
pub struct HttpClient {
  /// Underlying HTTP client.
  http: Client,
  /// Client configuration.
  config: HttpClientConfig,
  /// Concurrency limiter.
  semaphore: Arc<Semaphore>,
  /// Request budget.
  limiter: DefaultDirectRateLimiter,
}

impl HttpClient {
  /// Create a new venue client.
  pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .build()
      .context("Failed to build HTTP client")?;

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
    let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
    let limiter = RateLimiter::direct(Quota::per_second(rps));

    Ok(Self {
      http,
      config,
      semaphore,
      limiter,
    })
  }

  pub fn source_name(&self) -> &str {
    &self.config.source_name
  }

  /// GET `path` and decode JSON. `Ok(None)` on 404.
  pub async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> TradingResult<Option<T>> {
    let Some(response) = self.get(path, query).await? else {
      return Ok(None);
    };
    let body = response
      .json::<T>()
      .await
      .map_err(|e| TradingError::malformed(self.config.source_name.clone(), e))?;
    Ok(Some(body))
  }

  /// Execute a GET with rate limiting and retries. `Ok(None)` on 404.
  async fn get(&self, path: &str, query: &[(&str, String)]) -> TradingResult<Option<Response>> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .map_err(|_| TradingError::upstream(self.config.source_name.clone(), "client shut down"))?;

    let url = format!(
      "{}/{}",
      self.config.base_url.trim_end_matches('/'),
      path.trim_start_matches('/')
    );
    let mut last_error = None;

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let delay = match &last_error {
          Some(TradingError::RateLimited {
            retry_after: Some(wait),
            ..
          }) => *wait,
          _ => backoff_delay(self.config.retry_base_delay, attempt),
        };
        debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying request");
        sleep(delay).await;
      }

      self.limiter.until_ready().await;

      let mut request = self.http.get(&url).query(query);
      if let Some(key) = &self.config.api_key {
        request = request.header(API_KEY_HEADER, key.expose());
      }

      let error = match request.send().await {
        Ok(response) => match response.status() {
          status if status.is_success() => return Ok(Some(response)),
          StatusCode::NOT_FOUND => return Ok(None),
          StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
              .headers()
              .get(RETRY_AFTER)
              .and_then(|v| v.to_str().ok())
              .and_then(|v| v.parse::<u64>().ok())
              .map(Duration::from_secs);
            warn!(path, ?retry_after, "Rate limited by venue, backing off");
            TradingError::RateLimited {
              source_name: self.config.source_name.clone(),
              retry_after,
            }
          }
          status if status.is_server_error() => {
            warn!(path, status = %status, "Server error, retrying");
            TradingError::upstream(self.config.source_name.clone(), format!("HTTP {status}"))
          }
          status => {
            let body = response.text().await.unwrap_or_default();
            return Err(TradingError::invalid_input(format!(
              "{} returned {status} for {path}: {body}",
              self.config.source_name
            )));
          }
        },
        Err(e) => {
          warn!(path, error = %e, attempt, "Request failed");
          TradingError::upstream(self.config.source_name.clone(), e)
        }
      };
      last_error = Some(error);
    }

    Err(last_error.unwrap_or_else(|| {
      TradingError::upstream(self.config.source_name.clone(), "max retries exceeded")
    }))
  }
}

/// Exponential backoff before retry `attempt` (1-based), capped at `MAX_BACKOFF`.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
  let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
  base.saturating_mul(factor).min(MAX_BACKOFF)
}
