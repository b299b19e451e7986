use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::model::{KeywordReportRow, Product, TagReportRow};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            id          INTEGER PRIMARY KEY,
            query       TEXT NOT NULL,
            source      TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS products (
            id          INTEGER PRIMARY KEY,
            run_id      INTEGER NOT NULL REFERENCES runs(id),
            rank        INTEGER NOT NULL,
            title       TEXT NOT NULL,
            price       INTEGER NOT NULL,
            store_name  TEXT NOT NULL,
            tags        TEXT NOT NULL,
            url         TEXT NOT NULL,
            is_ad       BOOLEAN NOT NULL DEFAULT 0,
            UNIQUE(run_id, rank)
        );
        CREATE INDEX IF NOT EXISTS idx_products_run ON products(run_id);

        CREATE TABLE IF NOT EXISTS keyword_reports (
            run_id                 INTEGER NOT NULL REFERENCES runs(id),
            rank                   INTEGER NOT NULL,
            keyword                TEXT NOT NULL,
            occurrence_count       INTEGER NOT NULL,
            related_product_count  INTEGER NOT NULL,
            UNIQUE(run_id, rank)
        );

        CREATE TABLE IF NOT EXISTS tag_reports (
            run_id       INTEGER NOT NULL REFERENCES runs(id),
            rank         INTEGER NOT NULL,
            tag          TEXT NOT NULL,
            usage_count  INTEGER NOT NULL,
            UNIQUE(run_id, rank)
        );
        ",
    )?;
    Ok(())
}

/// Everything one search or extract run produced.
pub struct RunRecord<'a> {
    pub query: &'a str,
    pub source: &'a str,
    pub products: &'a [Product],
    pub keywords: &'a [KeywordReportRow],
    pub tags: &'a [TagReportRow],
}

/// Store a run and its rows in one transaction. Returns the run id.
pub fn save_run(conn: &Connection, run: &RunRecord) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO runs (query, source) VALUES (?1, ?2)",
        rusqlite::params![run.query, run.source],
    )?;
    let run_id = tx.last_insert_rowid();
    {
        let mut p_stmt = tx.prepare(
            "INSERT INTO products (run_id, rank, title, price, store_name, tags, url, is_ad)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for p in run.products {
            let price = i64::try_from(p.price)
                .with_context(|| format!("Price {} of '{}' does not fit in SQLite", p.price, p.title))?;
            p_stmt.execute(rusqlite::params![
                run_id, p.rank, p.title, price, p.store_name, p.tags, p.url.as_str(), p.is_ad,
            ])?;
        }

        let mut k_stmt = tx.prepare(
            "INSERT INTO keyword_reports (run_id, rank, keyword, occurrence_count, related_product_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for k in run.keywords {
            k_stmt.execute(rusqlite::params![
                run_id, k.rank, k.keyword, k.occurrence_count, k.related_product_count,
            ])?;
        }

        let mut t_stmt = tx.prepare(
            "INSERT INTO tag_reports (run_id, rank, tag, usage_count) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for t in run.tags {
            t_stmt.execute(rusqlite::params![run_id, t.rank, t.tag, t.usage_count])?;
        }
    }
    tx.commit()?;
    Ok(run_id)
}

// ── History ──

pub struct RunSummary {
    pub id: i64,
    pub query: String,
    pub source: String,
    pub created_at: String,
    pub product_count: i64,
    pub top_keyword: Option<String>,
    pub top_tag: Option<String>,
}

pub fn fetch_runs(conn: &Connection, limit: usize) -> Result<Vec<RunSummary>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.query, r.source, r.created_at,
                (SELECT COUNT(*) FROM products p WHERE p.run_id = r.id),
                (SELECT keyword FROM keyword_reports k WHERE k.run_id = r.id AND k.rank = 1),
                (SELECT tag FROM tag_reports t WHERE t.run_id = r.id AND t.rank = 1)
         FROM runs r
         ORDER BY r.id DESC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok(RunSummary {
                id: row.get(0)?,
                query: row.get(1)?,
                source: row.get(2)?,
                created_at: row.get(3)?,
                product_count: row.get(4)?,
                top_keyword: row.get(5)?,
                top_tag: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_keywords(conn: &Connection, run_id: i64) -> Result<Vec<KeywordReportRow>> {
    let mut stmt = conn.prepare(
        "SELECT rank, keyword, occurrence_count, related_product_count
         FROM keyword_reports WHERE run_id = ?1 ORDER BY rank",
    )?;
    let rows = stmt
        .query_map([run_id], |row| {
            Ok(KeywordReportRow {
                rank: row.get(0)?,
                keyword: row.get(1)?,
                occurrence_count: row.get(2)?,
                related_product_count: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn save_and_list_runs() {
        let conn = memory_db();
        let products = vec![Product {
            rank: 1,
            title: "Wool Coat".into(),
            price: 50000,
            store_name: "ShopA".into(),
            tags: "#wool".into(),
            url: Url::parse("https://m.shopping.naver.com/product/1").unwrap(),
            is_ad: false,
        }];
        let keywords = vec![
            KeywordReportRow { rank: 1, keyword: "Wool".into(), occurrence_count: 1, related_product_count: 1 },
            KeywordReportRow { rank: 2, keyword: "Coat".into(), occurrence_count: 1, related_product_count: 1 },
        ];
        let tags = vec![TagReportRow { rank: 1, tag: "#wool".into(), usage_count: 1 }];

        let first = save_run(
            &conn,
            &RunRecord { query: "coat", source: "search", products: &products, keywords: &keywords, tags: &tags },
        )
        .unwrap();
        let second = save_run(
            &conn,
            &RunRecord { query: "empty", source: "extract", products: &[], keywords: &[], tags: &[] },
        )
        .unwrap();
        assert!(second > first);

        let runs = fetch_runs(&conn, 10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].query, "empty");
        assert_eq!(runs[0].product_count, 0);
        assert!(runs[0].top_keyword.is_none());
        assert_eq!(runs[1].product_count, 1);
        assert_eq!(runs[1].top_keyword.as_deref(), Some("Wool"));
        assert_eq!(runs[1].top_tag.as_deref(), Some("#wool"));

        assert_eq!(fetch_keywords(&conn, first).unwrap(), keywords);
    }

    #[test]
    fn oversized_price_rolls_back_run() {
        let conn = memory_db();
        let products = vec![Product {
            rank: 1,
            title: "Gold Bar".into(),
            price: u64::MAX,
            store_name: "Mint".into(),
            tags: String::new(),
            url: Url::parse("https://m.shopping.naver.com/product/9").unwrap(),
            is_ad: false,
        }];
        let err = save_run(
            &conn,
            &RunRecord { query: "gold", source: "search", products: &products, keywords: &[], tags: &[] },
        )
        .unwrap_err();
        assert!(err.to_string().contains("Gold Bar"));
        assert!(fetch_runs(&conn, 10).unwrap().is_empty());
    }

    #[test]
    fn limit_applies() {
        let conn = memory_db();
        for q in ["a", "b", "c"] {
            save_run(&conn, &RunRecord { query: q, source: "search", products: &[], keywords: &[], tags: &[] }).unwrap();
        }
        let runs = fetch_runs(&conn, 2).unwrap();
        assert_eq!(runs.iter().map(|r| r.query.as_str()).collect::<Vec<_>>(), vec!["c", "b"]);
    }
}
