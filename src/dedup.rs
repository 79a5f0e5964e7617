use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::dates;
use crate::parser::RawBlock;
use crate::text::collapse_whitespace;

/// Literal markers of a teaser card whose body is cut short by the site.
const TEASER_MARKERS: &[&str] = &["Voir plus", "See more"];

/// One review after whitespace canonicalisation and date parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedReview {
    pub title: String,
    pub text: String,
    /// Raw date expression as extracted, kept for export.
    pub date_text: String,
    pub date: Option<NaiveDate>,
    pub rating: Option<u8>,
}

impl NormalizedReview {
    pub fn from_raw(raw: RawBlock) -> Self {
        let date = dates::parse_date(&raw.date_text);
        Self {
            title: raw.title.trim().to_string(),
            text: collapse_whitespace(&raw.text),
            date_text: raw.date_text,
            date,
            rating: raw.rating,
        }
    }

    pub fn is_teaser(&self) -> bool {
        TEASER_MARKERS.iter().any(|m| self.text.contains(m))
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    /// Dedup key. Never leaves this module.
    fn normalized_text(&self) -> String {
        collapse_whitespace(&self.text)
    }

    /// Survivor preference inside a duplicate group: titled first, then latest date.
    fn preference(&self) -> (bool, Option<NaiveDate>) {
        (self.has_title(), self.date)
    }
}

/// Drop teasers, collapse duplicates by normalized text and order by date,
/// most recent first, undated records last.
pub fn merge_and_order<I>(records: I) -> Vec<NormalizedReview>
where
    I: IntoIterator<Item = NormalizedReview>,
{
    let mut survivors: Vec<NormalizedReview> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records.into_iter().filter(|r| !r.is_teaser()) {
        let key = record.normalized_text();
        match index.get(&key) {
            Some(&slot) => {
                // Strict comparison: on a full tie the first record seen stays.
                if record.preference() > survivors[slot].preference() {
                    survivors[slot] = record;
                }
            }
            None => {
                index.insert(key, survivors.len());
                survivors.push(record);
            }
        }
    }

    // Stable: equal dates keep first-seen order.
    survivors.sort_by_key(|r| (r.date.is_none(), Reverse(r.date)));
    survivors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(title: &str, text: &str, date: Option<(i32, u32, u32)>) -> NormalizedReview {
        NormalizedReview {
            title: title.to_string(),
            text: text.to_string(),
            date_text: String::new(),
            date: date.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            rating: None,
        }
    }

    fn texts(out: &[NormalizedReview]) -> Vec<&str> {
        out.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn whitespace_variants_collapse() {
        let out = merge_and_order(vec![
            review("", "a\n\n  b", None),
            review("", "a b", None),
        ]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn from_raw_collapses_text_and_parses_date() {
        let r = NormalizedReview::from_raw(RawBlock {
            title: " Top ".into(),
            text: "Très\n\nbien   servi".into(),
            date_text: "12 janv. 2025".into(),
            rating: Some(5),
        });
        assert_eq!(r.title, "Top");
        assert_eq!(r.text, "Très bien servi");
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2025, 1, 12));
        assert_eq!(r.rating, Some(5));
    }

    #[test]
    fn titled_beats_dated() {
        let out = merge_and_order(vec![
            review("", "Same text", Some((2024, 1, 1))),
            review("X", "Same text", None),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "X");
        assert_eq!(out[0].date, None);
    }

    #[test]
    fn latest_date_breaks_title_tie() {
        let out = merge_and_order(vec![
            review("A", "Same text", Some((2023, 1, 1))),
            review("B", "Same text", Some((2024, 6, 1))),
            review("C", "Same text", None),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "B");
    }

    #[test]
    fn full_tie_keeps_first() {
        let out = merge_and_order(vec![
            review("first", "Same", Some((2024, 1, 1))),
            review("second", "Same", Some((2024, 1, 1))),
        ]);
        assert_eq!(out[0].title, "first");
    }

    #[test]
    fn sorted_latest_first_undated_last() {
        let out = merge_and_order(vec![
            review("", "one", Some((2023, 5, 1))),
            review("", "two", None),
            review("", "three", Some((2024, 1, 1))),
        ]);
        assert_eq!(texts(&out), vec!["three", "one", "two"]);
    }

    #[test]
    fn teasers_are_dropped() {
        let out = merge_and_order(vec![
            review("T", "Livraison rapide... Voir plus", Some((2024, 1, 1))),
            review("", "Unique and complete", None),
        ]);
        assert_eq!(texts(&out), vec!["Unique and complete"]);
    }

    #[test]
    fn idempotent() {
        let once = merge_and_order(vec![
            review("", "b", Some((2022, 2, 2))),
            review("t", "a", None),
            review("", "a", Some((2024, 1, 1))),
            review("", "c", None),
            review("", "d", Some((2024, 1, 1))),
        ]);
        let twice = merge_and_order(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input() {
        assert!(merge_and_order(Vec::new()).is_empty());
    }
}
