use std::sync::LazyLock;

use regex::Regex;

use super::RawBlock;

// "Noté 4 sur 5 étoiles" / "Rated 4 out of 5 stars"
static RATING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:noté|rated)\s+([1-5])\s+(?:sur|out of)\s+5\s+(?:étoiles|stars)").unwrap()
});
static RELATIVE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)il y a \d+\s+(?:minutes?|heures?|jours?|semaines?|mois|ans?)|\d+\s+(?:minutes?|hours?|days?|weeks?|months?|years?)\s+ago",
    )
    .unwrap()
});
static ABSOLUTE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}\s+\w+\.?\s+\d{4}").unwrap());

/// Boilerplate lines between the rating and the review content, matched as
/// whole lines (lowercase, trailing ellipsis ignored).
const NOISE_LINES: &[&str] = &[
    "avis sur invitation",
    "avis spontané",
    "invited review",
    "spontaneous review",
    "voir plus",
    "see more",
];
const TITLE_DELIMITER: &str = "## ";
const DATE_LOOKAHEAD: usize = 5;

/// Mode B: review cards recovered from a page's rendered text.
pub struct TextScanExtractor;

impl TextScanExtractor {
    pub fn blocks<'a>(&self, document: &'a str) -> TextScanBlocks<'a> {
        TextScanBlocks {
            lines: document
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect(),
            pos: 0,
        }
    }
}

/// Iterator over the blocks of one document. Finite, single pass.
pub struct TextScanBlocks<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl Iterator for TextScanBlocks<'_> {
    type Item = RawBlock;

    fn next(&mut self) -> Option<RawBlock> {
        while self.pos < self.lines.len() {
            let line = self.lines[self.pos];
            self.pos += 1;

            let Some(rating) = rating_of(line) else {
                continue;
            };
            if let Some(block) = self.consume_card(rating) {
                return Some(block);
            }
            // A rating with nothing after it is noise; keep scanning.
        }
        None
    }
}

impl TextScanBlocks<'_> {
    /// Read the card that follows a rating anchor. `self.pos` is the line after it.
    fn consume_card(&mut self, rating: u8) -> Option<RawBlock> {
        let lines = &self.lines;
        let mut i = self.pos;

        while i < lines.len() && is_noise_line(lines[i]) {
            i += 1;
        }

        let mut title = String::new();
        if i < lines.len() && lines[i].contains(TITLE_DELIMITER) && rating_of(lines[i]).is_none() {
            title = parse_title(lines[i]);
            i += 1;
        }

        if i >= lines.len() || rating_of(lines[i]).is_some() {
            self.pos = i;
            return None;
        }
        let text = lines[i].to_string();
        i += 1;

        let date_text = lines[i..]
            .iter()
            .take(DATE_LOOKAHEAD)
            .take_while(|l| rating_of(l).is_none())
            .find_map(|l| find_date(l))
            .unwrap_or_default();

        self.pos = i;
        Some(RawBlock {
            title,
            text,
            date_text,
            rating: Some(rating),
        })
    }
}

fn rating_of(line: &str) -> Option<u8> {
    RATING_RE.captures(line)?.get(1)?.as_str().parse().ok()
}

fn is_noise_line(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    let bare = lower.trim_end_matches(['…', '.']).trim_end();
    NOISE_LINES.contains(&bare)
}

/// `[## Très bon accueil](/reviews/abc)` -> `Très bon accueil`
fn parse_title(line: &str) -> String {
    let after = line
        .split_once(TITLE_DELIMITER)
        .map(|(_, rest)| rest)
        .unwrap_or(line);
    let before_link = after.split_once("](").map(|(t, _)| t).unwrap_or(after);
    before_link.trim().trim_end_matches(']').trim().to_string()
}

fn find_date(line: &str) -> Option<String> {
    RELATIVE_DATE_RE
        .find(line)
        .or_else(|| ABSOLUTE_DATE_RE.find(line))
        .map(|m| m.as_str().to_string())
}
