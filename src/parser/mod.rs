pub mod pagination;
pub mod raw_spans;
pub mod structured;
pub mod text_scan;

use serde::Deserialize;

/// One review as found on a listing page, before normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub title: String,
    /// Never empty, already trimmed.
    pub text: String,
    pub date_text: String,
    /// Star rating, only captured by the text-scan mode.
    pub rating: Option<u8>,
}

/// Per-source extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMode {
    /// Machine-readable `data-*` markers in the page HTML.
    Structured,
    /// Heuristics over the rendered page text, one line at a time.
    TextScan,
    /// Bare review bodies in raw-text spans of rendered HTML.
    RawSpans,
}

pub enum Extractor {
    Structured(structured::StructuredExtractor),
    TextScan(text_scan::TextScanExtractor),
    RawSpans(raw_spans::RawSpansExtractor),
}

impl Extractor {
    pub fn for_mode(mode: ExtractionMode) -> Self {
        match mode {
            ExtractionMode::Structured => Self::Structured(structured::StructuredExtractor::new()),
            ExtractionMode::TextScan => Self::TextScan(text_scan::TextScanExtractor),
            ExtractionMode::RawSpans => Self::RawSpans(raw_spans::RawSpansExtractor),
        }
    }

    /// Every review block of one page, in document order.
    pub fn extract_blocks(&self, document: &str) -> Vec<RawBlock> {
        match self {
            Self::Structured(x) => x.extract(document),
            Self::TextScan(x) => x.blocks(document).collect(),
            Self::RawSpans(x) => x.extract(document),
        }
    }
}
