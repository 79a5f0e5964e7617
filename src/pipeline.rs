use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::dedup::{self, NormalizedReview};
use crate::fetch::Fetcher;
use crate::parser::pagination::resolve_page_count;
use crate::parser::Extractor;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Upper bound on the number of listing pages crawled.
    pub page_limit: Option<u32>,
    pub show_progress: bool,
}

/// Result of one run: the ordered reviews plus crawl counters.
#[derive(Debug)]
pub struct Crawl {
    pub reviews: Vec<NormalizedReview>,
    pub pages: u32,
    pub pages_ok: u32,
    pub pages_failed: u32,
    pub blocks: usize,
}

/// Crawl every listing page of `target` on `source` sequentially, then dedup and
/// order the reviews. Fails only when the first page cannot be fetched at all.
pub async fn run<F: Fetcher>(
    fetcher: &F,
    source: &SourceConfig,
    target: &str,
    lang: &str,
    options: &RunOptions,
) -> Result<Crawl> {
    let first_url = source.page_url(target, lang, 1);
    let first = fetcher
        .fetch(&first_url)
        .await
        .with_context(|| format!("First listing page unreachable: {}", first_url))?;

    let resolved = resolve_page_count(&first, source.mode);
    let pages = match options.page_limit {
        // Open-ended listings: the limit is the crawl length, the empty page the end.
        Some(limit) if source.stop_on_empty => limit.max(1),
        Some(limit) => resolved.min(limit).max(1),
        None => resolved,
    };
    info!("{} / {}: {} page(s) to crawl", source.name, target, pages);

    let pb = if options.show_progress {
        ProgressBar::new(pages as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let extractor = Extractor::for_mode(source.mode);
    let mut first = Some(first);
    let mut candidates: Vec<NormalizedReview> = Vec::new();
    let mut pages_ok = 0;
    let mut pages_failed = 0;

    for page in 1..=pages {
        let url = source.page_url(target, lang, page);
        let fetched = match first.take() {
            Some(p) => Ok(p),
            None => fetcher.fetch(&url).await,
        };
        pb.inc(1);

        let fetched = match fetched {
            Ok(p) if p.is_success() => p,
            Ok(p) => {
                warn!("Page {} skipped: status {:?} for {}", page, p.status, p.url);
                pages_failed += 1;
                continue;
            }
            Err(e) => {
                warn!("Page {} skipped: {}", page, e);
                pages_failed += 1;
                continue;
            }
        };

        let mut blocks = extractor.extract_blocks(&fetched.body);
        blocks.retain(|b| b.text.chars().count() >= source.min_text_len);
        debug!("Page {}: {} blocks in {}ms", page, blocks.len(), fetched.latency_ms);
        pages_ok += 1;
        if blocks.is_empty() {
            if source.stop_on_empty {
                info!("Page {} added no reviews, stopping: {}", page, url);
                break;
            }
            warn!("Page {} had no reviews: {}", page, url);
        }
        candidates.extend(blocks.into_iter().map(NormalizedReview::from_raw));
    }
    pb.finish_and_clear();

    let blocks = candidates.len();
    let reviews = dedup::merge_and_order(candidates);
    info!(
        "{} / {}: {} blocks from {} page(s) ({} failed) -> {} reviews",
        source.name,
        target,
        blocks,
        pages_ok,
        pages_failed,
        reviews.len()
    );

    Ok(Crawl {
        reviews,
        pages,
        pages_ok,
        pages_failed,
        blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    use chrono::NaiveDate;

    use crate::config::FetcherKind;
    use crate::fetch::{FetchError, Fetched};
    use crate::parser::ExtractionMode;

    /// Serves canned pages; unknown URLs fail at the transport level.
    struct StubFetcher {
        pages: HashMap<String, (u16, String)>,
        calls: RefCell<Vec<String>>,
    }

    impl StubFetcher {
        fn new(pages: Vec<(String, u16, String)>) -> Self {
            Self {
                pages: pages.into_iter().map(|(u, s, b)| (u, (s, b))).collect(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
            self.calls.borrow_mut().push(url.to_string());
            match self.pages.get(url) {
                Some((status, body)) => Ok(Fetched {
                    url: url.to_string(),
                    status: Some(*status),
                    body: body.clone(),
                    latency_ms: 0,
                }),
                None => Err(FetchError::Transport {
                    url: url.to_string(),
                    reason: "connection refused".into(),
                }),
            }
        }
    }

    fn source() -> SourceConfig {
        SourceConfig {
            name: "test".into(),
            listing_url: "https://reviews.test/{target}?page={page}&lang={lang}".into(),
            mode: ExtractionMode::Structured,
            fetcher: FetcherKind::Http,
            page_size: 10,
            min_text_len: 0,
            stop_on_empty: false,
        }
    }

    fn spans_source() -> SourceConfig {
        SourceConfig {
            name: "spans".into(),
            listing_url: "https://biz.test/{target}?start={offset}".into(),
            mode: ExtractionMode::RawSpans,
            fetcher: FetcherKind::Spider,
            page_size: 10,
            min_text_len: 20,
            stop_on_empty: true,
        }
    }

    fn spans_page(texts: &[&str]) -> String {
        let spans: String = texts
            .iter()
            .map(|t| format!(r#"<p><span class="raw__09f24__Ab1">{}</span></p>"#, t))
            .collect();
        format!("<html><body>{}</body></html>", spans)
    }

    fn url(page: u32) -> String {
        source().page_url("shop.test", "fr", page)
    }

    fn card(title: &str, text: &str, date: &str) -> String {
        format!(
            r#"<article>
                 <h2 data-service-review-title-typography="true">{}</h2>
                 <p data-service-review-text-typography="true">{}</p>
                 <p data-service-review-date-of-experience-typography="true">Date de l'expérience: {}</p>
               </article>"#,
            title, text, date
        )
    }

    fn listing(last_page: u32, cards: &[String]) -> String {
        format!(
            r#"<html><body>{}<a name="pagination-button-last"><span>{}</span></a></body></html>"#,
            cards.concat(),
            last_page
        )
    }

    async fn run_default(fetcher: &StubFetcher, limit: Option<u32>) -> Result<Crawl> {
        let options = RunOptions {
            page_limit: limit,
            show_progress: false,
        };
        run(fetcher, &source(), "shop.test", "fr", &options).await
    }

    #[tokio::test]
    async fn two_pages_merged_and_ordered() {
        let p1 = listing(
            2,
            &[card("", "Great shop", ""), card("T1", "Bad service", "1 mars 2024")],
        );
        let p2 = listing(2, &[card("Nice!", "Great  shop", "2 mars 2024")]);
        let fetcher = StubFetcher::new(vec![(url(1), 200, p1), (url(2), 200, p2)]);

        let crawl = run_default(&fetcher, None).await.unwrap();

        assert_eq!(crawl.pages, 2);
        assert_eq!(crawl.blocks, 3);
        assert_eq!(crawl.reviews.len(), 2);
        assert_eq!(crawl.reviews[0].text, "Great shop");
        assert_eq!(crawl.reviews[0].title, "Nice!");
        assert_eq!(crawl.reviews[0].date, NaiveDate::from_ymd_opt(2024, 3, 2));
        assert_eq!(crawl.reviews[1].text, "Bad service");
        assert_eq!(crawl.reviews[1].date, NaiveDate::from_ymd_opt(2024, 3, 1));
        // Page 1 is fetched once and reused.
        assert_eq!(*fetcher.calls.borrow(), vec![url(1), url(2)]);
    }

    #[tokio::test]
    async fn page_limit_caps_crawl() {
        let p = listing(9, &[card("", "Seul avis", "")]);
        let fetcher = StubFetcher::new(vec![(url(1), 200, p.clone()), (url(2), 200, p)]);

        let crawl = run_default(&fetcher, Some(2)).await.unwrap();

        assert_eq!(crawl.pages, 2);
        assert_eq!(fetcher.calls.borrow().len(), 2);
        assert_eq!(crawl.reviews.len(), 1);
    }

    #[tokio::test]
    async fn later_page_failures_keep_collected_reviews() {
        let p1 = listing(3, &[card("", "Premier", "4 mai 2024")]);
        let fetcher = StubFetcher::new(vec![(url(1), 200, p1), (url(2), 503, String::new())]);

        let crawl = run_default(&fetcher, None).await.unwrap();

        assert_eq!(crawl.pages, 3);
        assert_eq!(crawl.pages_ok, 1);
        assert_eq!(crawl.pages_failed, 2);
        assert_eq!(crawl.reviews.len(), 1);
    }

    #[tokio::test]
    async fn unreachable_first_page_fails_run() {
        let fetcher = StubFetcher::new(Vec::new());
        assert!(run_default(&fetcher, None).await.is_err());
    }

    #[tokio::test]
    async fn non_success_first_page_is_empty_result() {
        let fetcher = StubFetcher::new(vec![(url(1), 403, "<html>blocked</html>".into())]);

        let crawl = run_default(&fetcher, None).await.unwrap();

        assert_eq!(crawl.pages, 1);
        assert_eq!(crawl.pages_failed, 1);
        assert!(crawl.reviews.is_empty());
    }

    #[tokio::test]
    async fn offset_pages_until_one_adds_nothing() {
        let src = spans_source();
        let url = |page| src.page_url("bistro", "fr", page);
        let fetcher = StubFetcher::new(vec![
            (url(1), 200, spans_page(&["Excellent repas, service attentionné.", "Merci !"])),
            (url(2), 200, spans_page(&["Trop bruyant le soir, dommage pour nous."])),
            (url(3), 200, spans_page(&["Top"])),
            (url(4), 200, spans_page(&["Jamais atteinte, le crawl s'arrête avant."])),
        ]);
        let options = RunOptions {
            page_limit: Some(10),
            show_progress: false,
        };

        let crawl = run(&fetcher, &src, "bistro", "fr", &options).await.unwrap();

        assert_eq!(
            *fetcher.calls.borrow(),
            vec![
                "https://biz.test/bistro?start=0".to_string(),
                "https://biz.test/bistro?start=10".to_string(),
                "https://biz.test/bistro?start=20".to_string(),
            ]
        );
        assert_eq!(crawl.pages_ok, 3);
        assert_eq!(crawl.blocks, 2);
        let texts: Vec<&str> = crawl.reviews.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Excellent repas, service attentionné.", "Trop bruyant le soir, dommage pour nous."]
        );
    }

    #[tokio::test]
    async fn short_blocks_are_not_reviews() {
        let mut src = spans_source();
        src.stop_on_empty = false;
        let p1 = spans_page(&["Ok", "Une vraie critique, assez longue pour compter."]);
        let fetcher = StubFetcher::new(vec![(src.page_url("bistro", "fr", 1), 200, p1)]);

        let crawl = run(&fetcher, &src, "bistro", "fr", &RunOptions::default()).await.unwrap();

        assert_eq!(crawl.pages, 1);
        assert_eq!(crawl.reviews.len(), 1);
        assert_eq!(crawl.reviews[0].text, "Une vraie critique, assez longue pour compter.");
    }

    #[tokio::test]
    async fn counted_listing_does_not_stop_on_empty_page() {
        let p1 = listing(3, &[card("", "Premier", "")]);
        let p2 = listing(3, &[]);
        let p3 = listing(3, &[card("", "Troisième", "")]);
        let fetcher = StubFetcher::new(vec![(url(1), 200, p1), (url(2), 200, p2), (url(3), 200, p3)]);

        let crawl = run_default(&fetcher, None).await.unwrap();

        assert_eq!(crawl.pages_ok, 3);
        assert_eq!(crawl.reviews.len(), 2);
    }

    #[tokio::test]
    async fn teasers_never_reach_output() {
        let p1 = listing(
            1,
            &[card("A", "Trois semaines... Voir plus", "1 mai 2024"), card("", "Complet", "")],
        );
        let fetcher = StubFetcher::new(vec![(url(1), 200, p1)]);

        let crawl = run_default(&fetcher, None).await.unwrap();

        assert_eq!(crawl.reviews.len(), 1);
        assert_eq!(crawl.reviews[0].text, "Complet");
    }
}
