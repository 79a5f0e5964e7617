use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::ExtractionMode;
use crate::fetch::Fetched;

static LAST_PAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[name="pagination-button-last"]"#).unwrap());
static PAGINATION_NAV: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[aria-label="Pagination navigation"]"#).unwrap());
// "1 of 7" / "1 sur 7"
static PAGE_OF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b\d+\s+(?:of|sur)\s+(\d+)\b").unwrap());
// Rendered pages keep the control as a markdown link: [Dernière page](...?page=6)
static LAST_PAGE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*(?:dernière page|last page)[^\]]*\]\([^)]*[?&]page=(\d+)").unwrap()
});

/// Number of listing pages announced by the first page. Falls back to 1 when
/// the page failed or carries no usable "last page" control.
pub fn resolve_page_count(first_page: &Fetched, mode: ExtractionMode) -> u32 {
    if !first_page.is_success() {
        warn!(
            "Page count: status {:?} for {}, assuming a single page",
            first_page.status, first_page.url
        );
        return 1;
    }

    let found = match mode {
        ExtractionMode::Structured => last_page_from_html(&first_page.body),
        ExtractionMode::TextScan => last_page_from_text(&first_page.body),
        ExtractionMode::RawSpans => last_page_from_indicator(&first_page.body),
    };
    match found {
        Some(n) => n,
        None => {
            debug!("No last-page control on {}, assuming a single page", first_page.url);
            1
        }
    }
}

fn last_page_from_html(document: &str) -> Option<u32> {
    let html = Html::parse_document(document);
    let label: String = html.select(&LAST_PAGE).next()?.text().collect();
    parse_page_number(&label)
}

fn last_page_from_text(document: &str) -> Option<u32> {
    let caps = LAST_PAGE_LINK_RE.captures(document)?;
    parse_page_number(&caps[1])
}

fn last_page_from_indicator(document: &str) -> Option<u32> {
    let html = Html::parse_document(document);
    let label: String = html.select(&PAGINATION_NAV).next()?.text().collect();
    let caps = PAGE_OF_RE.captures(&label)?;
    parse_page_number(&caps[1])
}

fn parse_page_number(label: &str) -> Option<u32> {
    label.trim().parse::<u32>().ok().filter(|n| *n >= 1)
}
