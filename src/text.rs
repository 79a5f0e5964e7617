use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use whatlang::Lang;

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+|www\.\S+").unwrap());
static EMOJI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x{1F600}-\x{1F64F}\x{1F300}-\x{1F5FF}\x{1F680}-\x{1F6FF}\x{1F1E0}-\x{1F1FF}]+")
        .unwrap()
});

/// Reduce every run of whitespace (newlines included) to one space, then trim.
pub fn collapse_whitespace(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}

/// Cleanup applied to a review body before it is handed to a reply template.
pub fn clean_text(text: &str) -> String {
    let normalized: String = text.nfkc().collect();
    let without_emoji = EMOJI_RE.replace_all(&normalized, " ");
    let mut t = without_emoji.trim();

    if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        t = t[1..t.len() - 1].trim();
    }

    let without_urls = URL_RE.replace_all(t, "");
    collapse_whitespace(&without_urls)
}

/// Two-letter code of the language a review is written in, `None` when the
/// text carries no letters to go on.
pub fn detect_language(text: &str) -> Option<String> {
    let info = whatlang::detect(text)?;
    let code = match info.lang() {
        Lang::Fra => "fr",
        Lang::Eng => "en",
        Lang::Deu => "de",
        Lang::Spa => "es",
        Lang::Ita => "it",
        Lang::Por => "pt",
        Lang::Nld => "nl",
        other => return Some(other.code().to_string()),
    };
    Some(code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_newlines_and_runs() {
        assert_eq!(collapse_whitespace("a\n\n  b"), "a b");
        assert_eq!(collapse_whitespace("  a b  "), "a b");
        assert_eq!(collapse_whitespace("\t\n"), "");
    }

    #[test]
    fn clean_strips_quotes_urls_and_emoji() {
        let raw = "\"Super boutique 😊 voir https://example.com/x\n\nmerci\"";
        assert_eq!(clean_text(raw), "Super boutique voir merci");
    }

    #[test]
    fn clean_keeps_inner_quotes() {
        assert_eq!(clean_text("le \"meilleur\" service"), "le \"meilleur\" service");
    }

    #[test]
    fn clean_applies_compatibility_normalization() {
        assert_eq!(clean_text("Ｔｒès ｂｉｅｎ"), "Très bien");
        assert_eq!(clean_text("ef\u{FB01}cace\u{00A0}et\u{2009}rapide"), "efficace et rapide");
        assert_eq!(clean_text("cafe\u{0301}"), "café");
    }

    #[test]
    fn detects_review_language() {
        let fr = "Commande arrivée rapidement, le service client a été très aimable et le produit est conforme à la description.";
        let en = "The order arrived quickly, customer service was very friendly and the product matches the description.";
        assert_eq!(detect_language(fr).as_deref(), Some("fr"));
        assert_eq!(detect_language(en).as_deref(), Some("en"));
        assert_eq!(detect_language("12345 !!! 😊"), None);
        assert_eq!(detect_language(""), None);
    }

    #[test]
    fn clean_lone_quote() {
        assert_eq!(clean_text("\""), "\"");
    }
}
