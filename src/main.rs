mod config;
mod dates;
mod db;
mod dedup;
mod export;
mod fetch;
mod parser;
mod pipeline;
mod reply;
mod text;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::fetch::{AnyFetcher, Fetcher};
use crate::reply::{Locale, Sentiment, Tone};

#[derive(Parser)]
#[command(name = "review_scraper", about = "Review listing scraper and normalizer")]
struct Cli {
    /// Settings file (missing file means defaults)
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the first listing page and print how many pages there are
    Pages {
        #[arg(short, long, default_value = "trustpilot")]
        source: String,
        /// Reviewed site, e.g. boursobank.com
        #[arg(short, long)]
        target: String,
        #[arg(short, long, default_value = "fr")]
        lang: String,
    },
    /// Crawl all listing pages, dedup and store the reviews
    Run {
        #[arg(short, long, default_value = "trustpilot")]
        source: String,
        #[arg(short, long)]
        target: String,
        #[arg(short, long, default_value = "fr")]
        lang: String,
        /// Max listing pages to crawl
        #[arg(short = 'n', long)]
        limit: Option<u32>,
        /// Print reviews as JSON lines
        #[arg(long)]
        json: bool,
        /// Skip the database
        #[arg(long)]
        no_save: bool,
        /// Also write a CSV (default name: reviews_<target>_<lang>.csv)
        #[arg(long, num_args = 0..=1)]
        csv: Option<Option<PathBuf>>,
    },
    /// Write stored reviews of a target to CSV
    Export {
        #[arg(short, long)]
        target: String,
        #[arg(short, long)]
        source: Option<String>,
        #[arg(short, long, default_value = "fr")]
        lang: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Per-target counts of stored reviews
    Stats,
    /// Render a reply for one review
    Reply {
        #[arg(long)]
        text: String,
        /// positive, neutral or negative
        #[arg(long, conflicts_with = "stars")]
        sentiment: Option<String>,
        /// Star rating 1-5, mapped to a sentiment
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        stars: Option<u8>,
        /// Reply language; detected from the review when omitted (fallback fr)
        #[arg(short, long)]
        lang: Option<String>,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        platform: Option<String>,
        /// formal, friendly or empathetic
        #[arg(long, default_value = "formal")]
        tone: Tone,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Pages { source, target, lang } => {
            let settings = Settings::load(&cli.config)?;
            let source = settings.source(&source)?;
            let fetcher = AnyFetcher::for_source(&source, &settings)?;
            let url = source.page_url(&target, &lang, 1);
            let first = fetcher
                .fetch(&url)
                .await
                .with_context(|| format!("First listing page unreachable: {}", url))?;
            let pages = parser::pagination::resolve_page_count(&first, source.mode);
            println!("{} / {}: {} page(s)", source.name, target, pages);
            Ok(())
        }
        Commands::Run {
            source,
            target,
            lang,
            limit,
            json,
            no_save,
            csv,
        } => {
            let settings = Settings::load(&cli.config)?;
            let source = settings.source(&source)?;
            let fetcher = AnyFetcher::for_source(&source, &settings)?;
            let options = pipeline::RunOptions {
                page_limit: limit,
                show_progress: !json,
            };

            let t_crawl = Instant::now();
            let crawl = pipeline::run(&fetcher, &source, &target, &lang, &options).await?;
            eprintln!(
                "Crawled {} page(s) ({} ok, {} failed) in {}: {} blocks -> {} reviews",
                crawl.pages,
                crawl.pages_ok,
                crawl.pages_failed,
                format_duration(t_crawl.elapsed()),
                crawl.blocks,
                crawl.reviews.len()
            );

            if json {
                for review in &crawl.reviews {
                    println!("{}", serde_json::to_string(review)?);
                }
            } else {
                print_reviews(&crawl.reviews);
            }

            if !no_save {
                let conn = db::connect(&settings.db_path)?;
                db::init_schema(&conn)?;
                let inserted = db::save_reviews(&conn, &source.name, &target, &crawl.reviews)?;
                db::record_run(
                    &conn,
                    &db::RunRow {
                        source: source.name.clone(),
                        target: target.clone(),
                        lang: lang.clone(),
                        pages: crawl.pages,
                        pages_ok: crawl.pages_ok,
                        pages_failed: crawl.pages_failed,
                        blocks: crawl.blocks,
                        reviews: crawl.reviews.len(),
                    },
                )?;
                eprintln!("Saved to {} ({} new)", settings.db_path, inserted);
            }

            if let Some(path) = csv {
                let path = path.unwrap_or_else(|| export::default_path(&target, &lang));
                export::write_csv(&path, &crawl.reviews)?;
                eprintln!("Wrote {}", path.display());
            }
            Ok(())
        }
        Commands::Export {
            target,
            source,
            lang,
            output,
        } => {
            let settings = Settings::load(&cli.config)?;
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let reviews = db::fetch_reviews(&conn, &target, source.as_deref())?;
            if reviews.is_empty() {
                println!("No stored reviews for {}. Run 'run' first.", target);
                return Ok(());
            }
            let path = output.unwrap_or_else(|| export::default_path(&target, &lang));
            export::write_csv(&path, &reviews)?;
            println!("Wrote {} reviews to {}", reviews.len(), path.display());
            Ok(())
        }
        Commands::Stats => {
            let settings = Settings::load(&cli.config)?;
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let stats = db::get_stats(&conn)?;
            if stats.is_empty() {
                println!("No reviews stored yet.");
                return Ok(());
            }

            println!(
                "{:<28} | {:<20} | {:>6} | {:>6} | {:>6} | {:>6} | {:<10} | {:>4}",
                "Target", "Source", "Total", "Dated", "Titled", "Rated", "Latest", "Runs"
            );
            println!("{}", "-".repeat(108));
            for s in &stats {
                let latest = s
                    .latest
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:<28} | {:<20} | {:>6} | {:>6} | {:>6} | {:>6} | {:<10} | {:>4}",
                    truncate(&s.target, 28),
                    truncate(&s.source, 20),
                    s.total,
                    s.dated,
                    s.titled,
                    s.rated,
                    latest,
                    s.runs
                );
            }
            Ok(())
        }
        Commands::Reply {
            text,
            sentiment,
            stars,
            lang,
            brand,
            platform,
            tone,
        } => {
            let sentiment = match (stars, sentiment) {
                (Some(n), _) => Sentiment::from_stars(n),
                (None, Some(label)) => Sentiment::from_label(&label),
                (None, None) => anyhow::bail!("Either --sentiment or --stars is required"),
            };
            let review = crate::text::clean_text(&text);
            let reply = crate::reply::render_reply(
                &review,
                sentiment,
                Locale::resolve(lang.as_deref(), &review),
                brand.as_deref(),
                platform.as_deref(),
                tone,
            );
            println!("[{}] {}\n", sentiment, truncate(&review, 80));
            println!("{}", reply);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_reviews(reviews: &[dedup::NormalizedReview]) {
    for (i, r) in reviews.iter().enumerate() {
        let date = r
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".into());
        let rating = r.rating.map(|n| format!("{}/5", n)).unwrap_or_else(|| "-".into());
        let title = if r.title.is_empty() { "(untitled)" } else { r.title.as_str() };
        println!(
            "{:>4} | {:<10} | {:>3} | {:<32} | {}",
            i + 1,
            date,
            rating,
            truncate(title, 32),
            truncate(&r.text, 60)
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
