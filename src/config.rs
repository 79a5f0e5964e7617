use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::parser::ExtractionMode;

pub const DEFAULT_CONFIG_FILE: &str = "reviews.toml";
const ENV_PREFIX: &str = "REVIEWS";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Which collaborator turns a URL into a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetcherKind {
    /// Plain HTTP GET, raw HTML.
    Http,
    /// spider.cloud rendering: markdown for text-scan sources, HTML otherwise.
    Spider,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    /// Template with `{target}`, `{lang}`, `{page}` (1-based) and `{offset}`
    /// (`(page - 1) * page_size`) placeholders.
    pub listing_url: String,
    pub mode: ExtractionMode,
    pub fetcher: FetcherKind,
    /// Reviews per listing page, only used by `{offset}`.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Blocks with a shorter text (in characters) are not reviews.
    #[serde(default)]
    pub min_text_len: usize,
    /// The listing has no reliable page count: crawl up to the page limit and
    /// stop at the first page that yields nothing.
    #[serde(default)]
    pub stop_on_empty: bool,
}

fn default_page_size() -> u32 {
    10
}

impl SourceConfig {
    pub fn page_url(&self, target: &str, lang: &str, page: u32) -> String {
        let offset = page.saturating_sub(1).saturating_mul(self.page_size);
        self.listing_url
            .replace("{target}", target)
            .replace("{lang}", lang)
            .replace("{page}", &page.to_string())
            .replace("{offset}", &offset.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: String,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub sources: Vec<SourceConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: "data/reviews.sqlite".to_string(),
            max_retries: 3,
            backoff_ms: 2000,
            timeout_secs: 30,
            user_agent: BROWSER_USER_AGENT.to_string(),
            sources: Vec::new(),
        }
    }
}

impl Settings {
    /// Optional TOML file, then `REVIEWS_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize::<Settings>()
            .context("Invalid configuration")?;
        Ok(settings)
    }

    /// Built-in sources, overridden or extended by the configured ones.
    pub fn source_registry(&self) -> Vec<SourceConfig> {
        let mut sources = builtin_sources();
        for custom in &self.sources {
            match sources.iter_mut().find(|s| s.name == custom.name) {
                Some(existing) => *existing = custom.clone(),
                None => sources.push(custom.clone()),
            }
        }
        sources
    }

    pub fn source(&self, name: &str) -> Result<SourceConfig> {
        let registry = self.source_registry();
        registry
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .with_context(|| {
                let known: Vec<&str> = registry.iter().map(|s| s.name.as_str()).collect();
                format!("Unknown source '{}' (known: {})", name, known.join(", "))
            })
    }
}

const TRUSTPILOT_URL: &str =
    "https://fr.trustpilot.com/review/{target}?page={page}&languages={lang}&sort=recency";

fn builtin_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            name: "trustpilot".to_string(),
            listing_url: TRUSTPILOT_URL.to_string(),
            mode: ExtractionMode::Structured,
            fetcher: FetcherKind::Http,
            page_size: default_page_size(),
            min_text_len: 0,
            stop_on_empty: false,
        },
        SourceConfig {
            name: "trustpilot-rendered".to_string(),
            listing_url: TRUSTPILOT_URL.to_string(),
            mode: ExtractionMode::TextScan,
            fetcher: FetcherKind::Spider,
            page_size: default_page_size(),
            min_text_len: 0,
            stop_on_empty: false,
        },
        // Business slug as target, e.g. `le-comptoir-paris`. Rendered HTML only.
        SourceConfig {
            name: "yelp".to_string(),
            listing_url: "https://www.yelp.com/biz/{target}?start={offset}".to_string(),
            mode: ExtractionMode::RawSpans,
            fetcher: FetcherKind::Spider,
            page_size: 10,
            min_text_len: 80,
            stop_on_empty: true,
        },
    ]
}
