use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;

use crate::dedup::NormalizedReview;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            id           INTEGER PRIMARY KEY,
            source       TEXT NOT NULL,
            target       TEXT NOT NULL,
            lang         TEXT NOT NULL,
            pages        INTEGER NOT NULL,
            pages_ok     INTEGER NOT NULL,
            pages_failed INTEGER NOT NULL,
            blocks       INTEGER NOT NULL,
            reviews      INTEGER NOT NULL,
            finished_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_runs_target ON runs(target);

        CREATE TABLE IF NOT EXISTS reviews (
            id            INTEGER PRIMARY KEY,
            source        TEXT NOT NULL,
            target        TEXT NOT NULL,
            title         TEXT NOT NULL DEFAULT '',
            text          TEXT NOT NULL,
            date_text     TEXT NOT NULL DEFAULT '',
            date          TEXT,
            rating        INTEGER CHECK(rating BETWEEN 1 AND 5),
            first_seen_at TEXT NOT NULL DEFAULT (datetime('now')),
            last_seen_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(source, target, text)
        );
        CREATE INDEX IF NOT EXISTS idx_reviews_target ON reviews(target);
        CREATE INDEX IF NOT EXISTS idx_reviews_date ON reviews(date);
        ",
    )?;
    Ok(())
}

// ── Runs ──

pub struct RunRow {
    pub source: String,
    pub target: String,
    pub lang: String,
    pub pages: u32,
    pub pages_ok: u32,
    pub pages_failed: u32,
    pub blocks: usize,
    pub reviews: usize,
}

pub fn record_run(conn: &Connection, run: &RunRow) -> Result<i64> {
    conn.execute(
        "INSERT INTO runs (source, target, lang, pages, pages_ok, pages_failed, blocks, reviews)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            run.source, run.target, run.lang, run.pages, run.pages_ok, run.pages_failed,
            run.blocks as i64, run.reviews as i64,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Reviews ──

/// Upsert reviews of one target. A review seen again keeps its row and gets
/// the latest title/date/rating. Returns the number of new rows.
pub fn save_reviews(
    conn: &Connection,
    source: &str,
    target: &str,
    reviews: &[NormalizedReview],
) -> Result<usize> {
    let before = count_reviews(conn, source, target)?;

    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO reviews (source, target, title, text, date_text, date, rating)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(source, target, text) DO UPDATE SET
                title = excluded.title,
                date_text = excluded.date_text,
                date = excluded.date,
                rating = excluded.rating,
                last_seen_at = datetime('now')",
        )?;
        for r in reviews {
            stmt.execute(rusqlite::params![
                source, target, r.title, r.text, r.date_text, r.date, r.rating,
            ])?;
        }
    }
    tx.commit()?;

    Ok(count_reviews(conn, source, target)? - before)
}

fn count_reviews(conn: &Connection, source: &str, target: &str) -> Result<usize> {
    let n: usize = conn.query_row(
        "SELECT COUNT(*) FROM reviews WHERE source = ?1 AND target = ?2",
        rusqlite::params![source, target],
        |r| r.get(0),
    )?;
    Ok(n)
}

/// Stored reviews of a target, most recent first, undated last.
pub fn fetch_reviews(
    conn: &Connection,
    target: &str,
    source: Option<&str>,
) -> Result<Vec<NormalizedReview>> {
    let mut stmt = conn.prepare(
        "SELECT title, text, date_text, date, rating
         FROM reviews
         WHERE target = ?1 AND (?2 IS NULL OR source = ?2)
         ORDER BY date IS NULL, date DESC, id",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![target, source], |row| {
            Ok(NormalizedReview {
                title: row.get(0)?,
                text: row.get(1)?,
                date_text: row.get(2)?,
                date: row.get::<_, Option<NaiveDate>>(3)?,
                rating: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct TargetStats {
    pub source: String,
    pub target: String,
    pub total: usize,
    pub dated: usize,
    pub titled: usize,
    pub rated: usize,
    pub latest: Option<NaiveDate>,
    pub runs: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Vec<TargetStats>> {
    let mut stmt = conn.prepare(
        "SELECT r.source, r.target, COUNT(*),
                COUNT(r.date),
                SUM(CASE WHEN r.title <> '' THEN 1 ELSE 0 END),
                COUNT(r.rating),
                MAX(r.date),
                (SELECT COUNT(*) FROM runs u WHERE u.source = r.source AND u.target = r.target)
         FROM reviews r
         GROUP BY r.source, r.target
         ORDER BY r.target, r.source",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TargetStats {
                source: row.get(0)?,
                target: row.get(1)?,
                total: row.get(2)?,
                dated: row.get(3)?,
                titled: row.get(4)?,
                rated: row.get(5)?,
                latest: row.get(6)?,
                runs: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn review(title: &str, text: &str, date: Option<(i32, u32, u32)>, rating: Option<u8>) -> NormalizedReview {
        NormalizedReview {
            title: title.into(),
            text: text.into(),
            date_text: String::new(),
            date: date.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            rating,
        }
    }

    #[test]
    fn save_is_idempotent_and_updates() {
        let conn = conn();
        let first = vec![review("", "Great shop", None, None), review("T", "Bad", Some((2024, 3, 1)), Some(1))];
        assert_eq!(save_reviews(&conn, "trustpilot", "shop.test", &first).unwrap(), 2);

        let again = vec![review("Nice!", "Great shop", Some((2024, 3, 2)), Some(5))];
        assert_eq!(save_reviews(&conn, "trustpilot", "shop.test", &again).unwrap(), 0);

        let stored = fetch_reviews(&conn, "shop.test", None).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].text, "Great shop");
        assert_eq!(stored[0].title, "Nice!");
        assert_eq!(stored[0].rating, Some(5));
    }

    #[test]
    fn fetch_orders_undated_last_and_filters_source() {
        let conn = conn();
        let rows = vec![
            review("", "old", Some((2023, 5, 1)), None),
            review("", "none", None, None),
            review("", "new", Some((2024, 1, 1)), None),
        ];
        save_reviews(&conn, "trustpilot", "shop.test", &rows).unwrap();
        save_reviews(&conn, "other", "shop.test", &[review("", "elsewhere", None, None)]).unwrap();

        let texts: Vec<String> = fetch_reviews(&conn, "shop.test", Some("trustpilot"))
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert_eq!(texts, vec!["new", "old", "none"]);
        assert_eq!(fetch_reviews(&conn, "shop.test", None).unwrap().len(), 4);
        assert!(fetch_reviews(&conn, "nobody.test", None).unwrap().is_empty());
    }

    #[test]
    fn stats_per_target() {
        let conn = conn();
        save_reviews(
            &conn,
            "trustpilot",
            "shop.test",
            &[review("T", "a", Some((2024, 2, 2)), Some(4)), review("", "b", None, None)],
        )
        .unwrap();
        record_run(
            &conn,
            &RunRow {
                source: "trustpilot".into(),
                target: "shop.test".into(),
                lang: "fr".into(),
                pages: 1,
                pages_ok: 1,
                pages_failed: 0,
                blocks: 2,
                reviews: 2,
            },
        )
        .unwrap();

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.len(), 1);
        let s = &stats[0];
        assert_eq!((s.total, s.dated, s.titled, s.rated, s.runs), (2, 1, 1, 1, 1));
        assert_eq!(s.latest, NaiveDate::from_ymd_opt(2024, 2, 2));
    }
}
