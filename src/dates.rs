use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// "12 janv. 2025" embedded in longer prose such as "Actualisé le 12 janv. 2025".
static DATE_IN_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}\s+\w+\.?\s+\d{4}").unwrap());

/// Locale month spellings to the English month name understood by `%B`.
/// Keys are lowercase; abbreviations keep their trailing dot.
const MONTHS: &[(&str, &str)] = &[
    ("janvier", "January"),
    ("février", "February"),
    ("fevrier", "February"),
    ("mars", "March"),
    ("avril", "April"),
    ("mai", "May"),
    ("juin", "June"),
    ("juillet", "July"),
    ("août", "August"),
    ("aout", "August"),
    ("septembre", "September"),
    ("octobre", "October"),
    ("novembre", "November"),
    ("décembre", "December"),
    ("decembre", "December"),
    ("janv.", "January"),
    ("févr.", "February"),
    ("fevr.", "February"),
    ("avr.", "April"),
    ("juil.", "July"),
    ("sept.", "September"),
    ("oct.", "October"),
    ("nov.", "November"),
    ("déc.", "December"),
    ("dec.", "December"),
    ("january", "January"),
    ("february", "February"),
    ("march", "March"),
    ("april", "April"),
    ("may", "May"),
    ("june", "June"),
    ("july", "July"),
    ("august", "August"),
    ("september", "September"),
    ("october", "October"),
    ("november", "November"),
    ("december", "December"),
    ("jan.", "January"),
    ("feb.", "February"),
    ("mar.", "March"),
    ("apr.", "April"),
    ("jun.", "June"),
    ("jul.", "July"),
    ("aug.", "August"),
    ("sep.", "September"),
];

/// Canonical English month for a locale token, `None` when the token is unknown.
pub fn canonical_month(token: &str) -> Option<&'static str> {
    let lower = token.to_lowercase();
    let lookup = |key: &str| MONTHS.iter().find(|(k, _)| *k == key).map(|(_, v)| *v);

    lookup(&lower)
        .or_else(|| lookup(lower.trim_end_matches('.')))
        .or_else(|| lookup(&format!("{}.", lower)))
}

/// Parse a locale date expression ("12 janv. 2025", "Date de l'expérience: 7 décembre 2025")
/// into a calendar date. Anything that does not resolve to day, month and year is `None`.
pub fn parse_date(date_text: &str) -> Option<NaiveDate> {
    let trimmed = date_text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = DATE_IN_TEXT_RE
        .find(trimmed)
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    let mut parts = candidate.split_whitespace();
    let (day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    // Unknown tokens go through untouched and fail in the parser below.
    let month = canonical_month(month).unwrap_or(month);
    NaiveDate::parse_from_str(&format!("{} {} {}", day, month, year), "%d %B %Y").ok()
}
