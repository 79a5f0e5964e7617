use std::future::Future;
use std::time::{Duration, Instant};

use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{FetcherKind, Settings, SourceConfig};
use crate::parser::ExtractionMode;

/// One fetched listing page. A non-success status is data, not an error.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: String,
    pub status: Option<u16>,
    pub body: String,
    pub latency_ms: u64,
}

impl Fetched {
    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(s) if (200..300).contains(&s))
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build client: {0}")]
    Client(String),
    #[error("transport failure for {url}: {reason}")]
    Transport { url: String, reason: String },
    #[error("SPIDER_API_KEY environment variable must be set")]
    MissingApiKey,
    #[error("no content in response for {0}")]
    EmptyResponse(String),
}

/// Turns a URL into a document. Implementations own their transport concerns
/// (timeouts, retries); callers only see `Fetched` or a transport failure.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Fetched, FetchError>>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_backoff: Duration::from_millis(settings.backoff_ms),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

fn should_retry(status: Option<u16>) -> bool {
    matches!(status, Some(429 | 500 | 502 | 503))
}

/// Re-run `attempt` while the page answers with a throttling or server status.
async fn with_retry<F, Fut>(policy: RetryPolicy, url: &str, mut attempt: F) -> Result<Fetched, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Fetched, FetchError>>,
{
    for n in 0..policy.max_retries {
        let page = attempt().await?;
        if !should_retry(page.status) {
            return Ok(page);
        }

        let backoff = policy.backoff(n);
        warn!(
            "Status {:?} on {} (attempt {}/{}), backing off {:.1}s",
            page.status,
            url,
            n + 1,
            policy.max_retries,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }

    attempt().await
}

/// Raw HTML over HTTP.
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("fr-FR,fr;q=0.9,en;q=0.5"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            retry: RetryPolicy::from_settings(settings),
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<Fetched, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let start = Instant::now();
        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;
        let latency_ms = start.elapsed().as_millis() as u64;

        debug!("GET {} -> {} in {}ms ({} bytes)", url, status, latency_ms, body.len());
        Ok(Fetched {
            url: url.to_string(),
            status: Some(status),
            body,
            latency_ms,
        })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        with_retry(self.retry, url, || self.fetch_once(url)).await
    }
}

/// Rendered pages from spider.cloud, for pages that need a browser.
pub struct SpiderFetcher {
    spider: Spider,
    retry: RetryPolicy,
    /// Markdown for line-based extraction, rendered HTML for selector-based.
    markdown: bool,
}

impl SpiderFetcher {
    pub fn from_env(settings: &Settings, mode: ExtractionMode) -> Result<Self, FetchError> {
        let api_key = std::env::var("SPIDER_API_KEY").map_err(|_| FetchError::MissingApiKey)?;
        let spider = Spider::new(Some(api_key)).map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self {
            spider,
            retry: RetryPolicy::from_settings(settings),
            markdown: mode == ExtractionMode::TextScan,
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<Fetched, FetchError> {
        let format = if self.markdown {
            ReturnFormat::Markdown
        } else {
            ReturnFormat::Raw
        };
        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(format)),
            ..Default::default()
        };

        let start = Instant::now();
        let response = self
            .spider
            .scrape_url(url, Some(params), "application/json")
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (status, body) = parse_spider_response(response)
            .ok_or_else(|| FetchError::EmptyResponse(url.to_string()))?;

        debug!("spider {} -> {:?} in {}ms", url, status, latency_ms);
        Ok(Fetched {
            url: url.to_string(),
            status,
            body,
            latency_ms,
        })
    }
}

impl Fetcher for SpiderFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        with_retry(self.retry, url, || self.fetch_once(url)).await
    }
}

/// Pull `(status, content)` out of a spider.cloud scrape response. The API may
/// hand back the JSON array directly or as an encoded string.
fn parse_spider_response(value: serde_json::Value) -> Option<(Option<u16>, String)> {
    let parsed: serde_json::Value = match value.as_str() {
        Some(s) => serde_json::from_str(s).unwrap_or(value.clone()),
        None => value,
    };

    let first = parsed.as_array().and_then(|arr| arr.first())?;
    let content = first.get("content").and_then(|c| c.as_str())?.to_string();
    // Content without a status means the render itself went through. A status
    // that is not a valid HTTP code is unknown, hence not a success.
    let status = match first.get("status") {
        None => Some(200),
        Some(s) => s.as_u64().and_then(|s| u16::try_from(s).ok()),
    };

    Some((status, content))
}

/// The configured collaborator for a source.
pub enum AnyFetcher {
    Http(HttpFetcher),
    Spider(SpiderFetcher),
}

impl AnyFetcher {
    pub fn for_source(source: &SourceConfig, settings: &Settings) -> Result<Self, FetchError> {
        Ok(match source.fetcher {
            FetcherKind::Http => Self::Http(HttpFetcher::new(settings)?),
            FetcherKind::Spider => Self::Spider(SpiderFetcher::from_env(settings, source.mode)?),
        })
    }
}

impl Fetcher for AnyFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        match self {
            Self::Http(f) => f.fetch(url).await,
            Self::Spider(f) => f.fetch(url).await,
        }
    }
}
