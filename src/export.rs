use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::dedup::NormalizedReview;

const HEADERS: &[&str] = &["title", "text", "date_text", "date", "rating"];

/// `reviews_boursobank_com_fr.csv`
pub fn default_path(target: &str, lang: &str) -> PathBuf {
    PathBuf::from(format!("reviews_{}_{}.csv", target.replace('.', "_"), lang))
}

pub fn write_csv(path: &Path, reviews: &[NormalizedReview]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_reviews(&mut out, reviews)?;
    out.flush()?;
    Ok(())
}

pub fn write_reviews<W: Write>(mut w: W, reviews: &[NormalizedReview]) -> io::Result<()> {
    write_row(&mut w, HEADERS.iter().copied())?;
    for r in reviews {
        let date = r.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
        let rating = r.rating.map(|n| n.to_string()).unwrap_or_default();
        write_row(
            &mut w,
            [r.title.as_str(), r.text.as_str(), r.date_text.as_str(), date.as_str(), rating.as_str()],
        )?;
    }
    Ok(())
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<'a, W: Write>(mut w: W, row: impl IntoIterator<Item = &'a str>) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, ",")?;
        }
        first = false;
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}
