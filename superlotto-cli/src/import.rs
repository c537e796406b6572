use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::path::Path;
use superlotto_db::db::insert_draw;
use superlotto_db::models::Draw;
use superlotto_db::rusqlite::Connection;
use tracing::warn;

/// Accepte `AAAA-MM-JJ` ou `JJ/MM/AAAA`, normalise en `AAAA-MM-JJ`.
pub fn parse_date(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .with_context(|| format!("Format de date invalide: '{}'", raw))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Ligne `période;date;b1;b2;b3;b4;b5;e1;e2`.
fn parse_record(record: &csv::StringRecord) -> Result<Draw> {
    if record.len() < 9 {
        bail!("{} champs au lieu de 9", record.len());
    }
    let get = |idx: usize| -> Result<String> {
        record
            .get(idx)
            .map(|s| s.trim().to_string())
            .with_context(|| format!("Champ manquant à l'index {}", idx))
    };
    let get_u8 = |idx: usize| -> Result<u8> {
        let s = get(idx)?;
        s.parse::<u8>()
            .with_context(|| format!("Impossible de parser '{}' (index {})", s, idx))
    };

    let period_str = get(0)?;
    let period: u32 = period_str
        .parse()
        .with_context(|| format!("Période invalide: '{}'", period_str))?;
    let date = parse_date(&get(1)?)?;
    let balls = [get_u8(2)?, get_u8(3)?, get_u8(4)?, get_u8(5)?, get_u8(6)?];
    let stars = [get_u8(7)?, get_u8(8)?];

    Draw::new(period, date, balls, stars)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub errors: u32,
}

pub fn import_csv(conn: &Connection, path: &Path) -> Result<ImportResult> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_path(path)
        .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;

    let tx = conn
        .unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;

    let mut result = ImportResult::default();

    for record_result in reader.records() {
        result.total_records += 1;
        let line = result.total_records;
        let record = match record_result {
            Ok(record) => record,
            Err(e) => {
                warn!(line, error = %e, "lecture impossible");
                result.errors += 1;
                continue;
            }
        };
        // ligne d'en-tête éventuelle
        if line == 1 && record.get(0).is_some_and(|f| f.trim().parse::<u32>().is_err()) {
            result.total_records -= 1;
            continue;
        }
        match parse_record(&record) {
            Ok(draw) => match insert_draw(&tx, &draw) {
                Ok(true) => result.inserted += 1,
                Ok(false) => result.skipped += 1,
                Err(e) => {
                    warn!(line, period = draw.period, error = %e, "insertion impossible");
                    result.errors += 1;
                }
            },
            Err(e) => {
                warn!(line, error = %e, "ligne invalide");
                result.errors += 1;
            }
        }
    }

    tx.commit().context("Échec du commit")?;
    Ok(result)
}
