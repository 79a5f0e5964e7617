use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::RawBlock;

// Yelp renders review bodies as `<span class="raw__09f24__T4Ezm">`; the hash suffix changes.
static RAW_SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"span[class*="raw__09f24__"]"#).unwrap());

/// Mode C: review bodies only, one per raw-text span. No title, date or rating
/// is available in this layout. Short spans (labels, owner names) are dropped
/// later by the source's minimum text length.
#[derive(Default)]
pub struct RawSpansExtractor;

impl RawSpansExtractor {
    pub fn extract(&self, document: &str) -> Vec<RawBlock> {
        let html = Html::parse_document(document);
        html.select(&RAW_SPAN)
            .map(|span| {
                span.text()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|text| !text.is_empty())
            .map(|text| RawBlock {
                title: String::new(),
                text,
                date_text: String::new(),
                rating: None,
            })
            .collect()
    }
}
