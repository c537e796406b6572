use anyhow::{Context, Result};
use rusqlite::{Connection, Row};
use std::path::Path;

use crate::models::{Draw, History};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draws (
    period  INTEGER PRIMARY KEY,
    date    TEXT NOT NULL,
    ball_1  INTEGER NOT NULL,
    ball_2  INTEGER NOT NULL,
    ball_3  INTEGER NOT NULL,
    ball_4  INTEGER NOT NULL,
    ball_5  INTEGER NOT NULL,
    star_1  INTEGER NOT NULL,
    star_2  INTEGER NOT NULL
);
";

const SELECT_COLUMNS: &str =
    "SELECT period, date, ball_1, ball_2, ball_3, ball_4, ball_5, star_1, star_2 FROM draws";

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("superlotto.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

pub fn insert_draw(conn: &Connection, draw: &Draw) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO draws (period, date, ball_1, ball_2, ball_3, ball_4, ball_5, star_1, star_2)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            draw.period,
            draw.date,
            draw.balls[0],
            draw.balls[1],
            draw.balls[2],
            draw.balls[3],
            draw.balls[4],
            draw.stars[0],
            draw.stars[1],
        ],
    ).context("Échec de l'insertion")?;
    Ok(changed > 0)
}

fn row_to_draw(row: &Row<'_>) -> rusqlite::Result<Draw> {
    Ok(Draw {
        period: row.get(0)?,
        date: row.get(1)?,
        balls: [
            row.get::<_, u8>(2)?,
            row.get::<_, u8>(3)?,
            row.get::<_, u8>(4)?,
            row.get::<_, u8>(5)?,
            row.get::<_, u8>(6)?,
        ],
        stars: [
            row.get::<_, u8>(7)?,
            row.get::<_, u8>(8)?,
        ],
    })
}

/// Les `limit` derniers tirages, le plus récent en premier.
pub fn fetch_last_draws(conn: &Connection, limit: u32) -> Result<Vec<Draw>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY period DESC LIMIT ?1"))?;
    let draws = stmt
        .query_map([limit], row_to_draw)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(draws)
}

/// Tous les tirages en ordre chronologique.
pub fn fetch_all_draws(conn: &Connection) -> Result<Vec<Draw>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY period ASC"))?;
    let draws = stmt
        .query_map([], row_to_draw)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(draws)
}

pub fn load_history(conn: &Connection) -> Result<History> {
    let draws = fetch_all_draws(conn)?;
    History::from_draws(draws).context("Historique incohérent en base")
}

pub fn count_draws(conn: &Connection) -> Result<u32> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM draws", [], |row| row.get(0))?;
    Ok(count)
}
