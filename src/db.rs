use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde_json::Value;

use crate::flatten::levels::{SETS, SET_COMPONENTS, WORKOUTS, WORKOUT_COMPONENTS};
use crate::flatten::{Flattened, Record};
use crate::links::WorkoutUrl;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pages (
            id         INTEGER PRIMARY KEY,
            url        TEXT UNIQUE NOT NULL,
            username   TEXT NOT NULL,
            log_id     TEXT NOT NULL,
            visited    BOOLEAN NOT NULL DEFAULT 0,
            visited_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_pages_visited ON pages(visited);

        CREATE TABLE IF NOT EXISTS page_data (
            id           INTEGER PRIMARY KEY,
            page_id      INTEGER NOT NULL REFERENCES pages(id),
            url          TEXT NOT NULL,
            html         TEXT,
            status       INTEGER,
            error        TEXT,
            latency_ms   INTEGER,
            scraped_at   TEXT NOT NULL DEFAULT (datetime('now')),
            processed_at TEXT,
            parse_error  TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_page_data_processed ON page_data(processed_at);

        -- Flattened workout tree
        CREATE TABLE IF NOT EXISTS workouts (
            workout_id      TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            duration        INTEGER,
            created_by      TEXT,
            url             TEXT,
            muscles_used    TEXT,
            energy_level    INTEGER,
            self_rating     INTEGER,
            cardio_duration INTEGER
        );

        CREATE TABLE IF NOT EXISTS workout_components (
            workout_component_id TEXT PRIMARY KEY,
            workout_id           TEXT NOT NULL REFERENCES workouts(workout_id),
            created_at           TEXT NOT NULL,
            sequence             INTEGER,
            rest_time            INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_wc_workout ON workout_components(workout_id);

        CREATE TABLE IF NOT EXISTS sets (
            set_id               TEXT PRIMARY KEY,
            workout_component_id TEXT NOT NULL REFERENCES workout_components(workout_component_id),
            created_at           TEXT NOT NULL,
            sequence             INTEGER,
            rest_time            INTEGER,
            classification       TEXT CHECK(classification IN ('STRAIGHT','SUPER','DROP'))
        );
        CREATE INDEX IF NOT EXISTS idx_sets_component ON sets(workout_component_id);

        CREATE TABLE IF NOT EXISTS set_components (
            set_component_id TEXT PRIMARY KEY,
            set_id           TEXT NOT NULL REFERENCES sets(set_id),
            created_at       TEXT NOT NULL,
            sequence         INTEGER,
            weight_metric    TEXT CHECK(weight_metric IN ('lbs','kg','seconds')),
            weight           REAL,
            reps             INTEGER,
            rest_time        INTEGER,
            exercise_name    TEXT,
            exercise_link    TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_sc_set ON set_components(set_id);
        ",
    )?;
    Ok(())
}

// ── Scraping ──

pub fn insert_pages(conn: &Connection, pages: &[WorkoutUrl]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt =
            tx.prepare("INSERT OR IGNORE INTO pages (url, username, log_id) VALUES (?1, ?2, ?3)")?;
        for p in pages {
            count += stmt.execute(rusqlite::params![p.url, p.username, p.log_id])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_unvisited(conn: &Connection, limit: Option<usize>) -> Result<Vec<(i64, String)>> {
    let sql = format!(
        "SELECT id, url FROM pages WHERE visited = 0 ORDER BY id{}",
        limit_clause(limit)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct ScrapeRow {
    pub page_id: i64,
    pub url: String,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

// ── Processing ──

pub struct ScrapedPage {
    pub page_data_id: i64,
    pub url: String,
    pub html: String,
}

pub fn fetch_unprocessed(conn: &Connection, limit: Option<usize>) -> Result<Vec<ScrapedPage>> {
    let sql = format!(
        "SELECT id, url, html
         FROM page_data
         WHERE html IS NOT NULL AND processed_at IS NULL
         ORDER BY id{}",
        limit_clause(limit)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ScrapedPage {
                page_data_id: row.get(0)?,
                url: row.get(1)?,
                html: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

const WORKOUT_COLUMNS: &[&str] = &[
    "workout_id", "name", "created_at", "duration", "created_by", "url",
    "muscles_used", "energy_level", "self_rating", "cardio_duration",
];
const WORKOUT_COMPONENT_COLUMNS: &[&str] = &[
    "workout_component_id", "workout_id", "created_at", "sequence", "rest_time",
];
const SET_COLUMNS: &[&str] = &[
    "set_id", "workout_component_id", "created_at", "sequence", "rest_time", "classification",
];
const SET_COMPONENT_COLUMNS: &[&str] = &[
    "set_component_id", "set_id", "created_at", "sequence", "weight_metric", "weight",
    "reps", "rest_time", "exercise_name", "exercise_link",
];

/// Parent tables first so foreign keys resolve inside the transaction.
const TABLES: &[(&str, &[&str])] = &[
    (WORKOUTS, WORKOUT_COLUMNS),
    (WORKOUT_COMPONENTS, WORKOUT_COMPONENT_COLUMNS),
    (SETS, SET_COLUMNS),
    (SET_COMPONENTS, SET_COMPONENT_COLUMNS),
];

/// Insert flattened workouts, one transaction for the whole batch.
pub fn save_flattened(conn: &Connection, batch: &[Flattened]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        for (table, columns) in TABLES {
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders.join(", ")
            ))?;
            for flat in batch {
                for record in flat.records(table) {
                    let params = record_params(record, columns);
                    count += stmt
                        .execute(rusqlite::params_from_iter(params))
                        .with_context(|| format!("Failed to insert into {}", table))?;
                }
            }
        }
    }
    tx.commit()?;
    Ok(count)
}

fn record_params(record: &Record, columns: &[&str]) -> Vec<SqlValue> {
    columns
        .iter()
        .map(|c| record.get(*c).map(sql_value).unwrap_or(SqlValue::Null))
        .collect()
}

fn sql_value(v: &Value) -> SqlValue {
    match v {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Stamp pages as processed, with the parse error if extraction failed.
pub fn mark_processed(conn: &Connection, outcomes: &[(i64, Option<String>)]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "UPDATE page_data SET processed_at = datetime('now'), parse_error = ?2 WHERE id = ?1",
        )?;
        for (id, error) in outcomes {
            stmt.execute(rusqlite::params![id, error])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub visited: usize,
    pub unvisited: usize,
    pub scraped: usize,
    pub fetch_errors: usize,
    pub processed: usize,
    pub parse_errors: usize,
    pub workouts: usize,
    pub set_components: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };

    let total = count("SELECT COUNT(*) FROM pages")?;
    let visited = count("SELECT COUNT(*) FROM pages WHERE visited = 1")?;
    Ok(Stats {
        total,
        visited,
        unvisited: total - visited,
        scraped: count("SELECT COUNT(*) FROM page_data")?,
        fetch_errors: count("SELECT COUNT(*) FROM page_data WHERE error IS NOT NULL")?,
        processed: count("SELECT COUNT(*) FROM page_data WHERE processed_at IS NOT NULL")?,
        parse_errors: count("SELECT COUNT(*) FROM page_data WHERE parse_error IS NOT NULL")?,
        workouts: count("SELECT COUNT(*) FROM workouts")?,
        set_components: count("SELECT COUNT(*) FROM set_components")?,
    })
}

fn limit_clause(limit: Option<usize>) -> String {
    match limit {
        Some(n) => format!(" LIMIT {}", n),
        None => String::new(),
    }
}
