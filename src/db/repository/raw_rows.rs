use chrono::Utc;
use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::RawExtractionRow;

/// Append the rows of one extraction attempt. All rows land or none do.
pub fn append_raw_rows(
    conn: &Connection,
    rows: &[RawExtractionRow],
) -> Result<usize, DatabaseError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let tx = conn.unchecked_transaction()?;
    insert_raw_rows(&tx, rows)?;
    tx.commit()?;
    Ok(rows.len())
}

/// Insert rows without opening a transaction. The caller owns atomicity.
pub fn insert_raw_rows(
    conn: &Connection,
    rows: &[RawExtractionRow],
) -> Result<usize, DatabaseError> {
    let appended_at = Utc::now().to_rfc3339();
    {
        let mut stmt = conn.prepare(
            "INSERT INTO raw_extraction_rows
             (source_file, invoice_id_base, invoice_id_full, invoice_date, row_json, appended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for row in rows {
            let json = serde_json::to_string(row)
                .map_err(|e| DatabaseError::ConstraintViolation(format!("raw row encode: {e}")))?;
            stmt.execute(params![
                row.source_file,
                row.invoice_id_base,
                row.invoice_id_full,
                row.date,
                json,
                appended_at,
            ])?;
        }
    }
    Ok(rows.len())
}

/// Every raw row in append order.
pub fn load_raw_rows(conn: &Connection) -> Result<Vec<RawExtractionRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT row_id, row_json FROM raw_extraction_rows ORDER BY row_id")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;

    let mut out = Vec::new();
    for row in rows {
        let (row_id, json) = row?;
        let parsed: RawExtractionRow = serde_json::from_str(&json)
            .map_err(|e| DatabaseError::Corrupt(format!("raw row {row_id}: {e}")))?;
        out.push(parsed);
    }
    Ok(out)
}

pub fn count_raw_rows(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM raw_extraction_rows", [], |row| row.get(0))?)
}

pub fn clear_raw_rows(conn: &Connection) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM raw_extraction_rows", [])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn row(base: &str, full: &str, item: &str) -> RawExtractionRow {
        RawExtractionRow {
            source_file: format!("{full}.doc"),
            invoice_id_base: base.into(),
            invoice_id_full: full.into(),
            date: "03/14/2022".into(),
            qty: 2.0,
            item_no: item.into(),
            extended_total: Some(50.0),
            unit_cost: Some(25.0),
            ..Default::default()
        }
    }

    #[test]
    fn append_then_load_preserves_order() {
        let conn = open_memory_database().unwrap();
        append_raw_rows(&conn, &[row("5001", "5001", "A-1"), row("5001", "5001", "A-2")]).unwrap();
        append_raw_rows(&conn, &[row("5002", "5002", "B-1")]).unwrap();

        let loaded = load_raw_rows(&conn).unwrap();
        let items: Vec<&str> = loaded.iter().map(|r| r.item_no.as_str()).collect();
        assert_eq!(items, vec!["A-1", "A-2", "B-1"]);
        assert_eq!(loaded[0].unit_cost, Some(25.0));
    }

    #[test]
    fn append_empty_is_noop() {
        let conn = open_memory_database().unwrap();
        assert_eq!(append_raw_rows(&conn, &[]).unwrap(), 0);
        assert_eq!(count_raw_rows(&conn).unwrap(), 0);
    }

    #[test]
    fn corrupt_json_is_reported() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO raw_extraction_rows
             (source_file, invoice_id_base, invoice_id_full, invoice_date, row_json, appended_at)
             VALUES ('f', 'b', 'b', 'd', 'not json', 'now')",
            [],
        )
        .unwrap();
        assert!(matches!(load_raw_rows(&conn), Err(DatabaseError::Corrupt(_))));
    }

    #[test]
    fn clear_removes_everything() {
        let conn = open_memory_database().unwrap();
        append_raw_rows(&conn, &[row("1", "1", "x")]).unwrap();
        assert_eq!(clear_raw_rows(&conn).unwrap(), 1);
        assert!(load_raw_rows(&conn).unwrap().is_empty());
    }
}
