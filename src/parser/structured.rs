use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::RawBlock;

static ARTICLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("article").unwrap());
static TITLE_MARK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-service-review-title-typography]").unwrap());
static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").unwrap());
static TEXT_MARK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-service-review-text-typography]").unwrap());
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static DATE_MARK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[data-service-review-date-of-experience-typography]").unwrap()
});
static TIME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("time").unwrap());

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());
// "FR • 8 avis Très bon coton" -> profile summary ends after "8 avis"
static PROFILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[^•]*•\s*\d+\s+(?:avis|reviews?)(?:\s*[•·]\s*|\s+|$)").unwrap()
});

/// Lowercase phrases marking a metadata line rather than a review body.
const EXPERIENCE_DATE_PHRASES: &[&str] = &["date de l'expérience", "date of experience"];
const DATE_LABELS: &[&str] = &["Date de l'expérience:", "Date of experience:"];

/// Mode A: one `<article>` per review, fields located by `data-service-review-*`
/// attributes with tag-based fallbacks.
#[derive(Default)]
pub struct StructuredExtractor;

impl StructuredExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, document: &str) -> Vec<RawBlock> {
        let html = Html::parse_document(document);
        self.blocks(&html).collect()
    }

    /// Lazily walk the review containers of an already parsed page.
    pub fn blocks<'a>(&self, html: &'a Html) -> impl Iterator<Item = RawBlock> + 'a {
        html.select(&ARTICLE).filter_map(extract_article)
    }
}

fn extract_article(article: ElementRef) -> Option<RawBlock> {
    let title = article
        .select(&TITLE_MARK)
        .next()
        .or_else(|| article.select(&HEADING).next())
        .map(element_text)
        .unwrap_or_default();

    // No body means this container is not a review.
    let text_el = article.select(&TEXT_MARK).next().or_else(|| {
        article.select(&PARAGRAPH).find(|p| {
            let lower = element_text(*p).to_lowercase();
            !EXPERIENCE_DATE_PHRASES.iter().any(|phrase| lower.contains(phrase))
        })
    })?;
    let text = element_text(text_el);
    if text.is_empty() {
        return None;
    }

    let date_text = match article.select(&DATE_MARK).next() {
        Some(el) => element_text(el),
        None => article
            .select(&TIME)
            .map(element_text)
            .filter(|t| YEAR_RE.is_match(t))
            .last()
            .unwrap_or_default(),
    };

    Some(RawBlock {
        title: clean_title(&title),
        text,
        date_text: strip_date_label(&date_text),
        rating: None,
    })
}

/// Text nodes trimmed and joined by single spaces.
fn element_text(el: ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_date_label(date_text: &str) -> String {
    DATE_LABELS
        .iter()
        .fold(date_text.to_string(), |acc, label| acc.replace(label, ""))
        .trim()
        .to_string()
}

/// Drop a leading reviewer profile summary ("FR • 8 avis") from a card title.
pub fn clean_title(title: &str) -> String {
    let t = title.trim();
    match PROFILE_RE.find(t) {
        Some(m) => t[m.end()..]
            .trim_matches(|c: char| matches!(c, ' ' | '.' | '!' | '-'))
            .to_string(),
        None => t.to_string(),
    }
}
