use std::collections::VecDeque;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::enums::{FieldKind, ProcessingStatus, RegistryField};
use crate::models::{SourceDocument, SourceRecord};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Rows fetched per page while scanning.
const SCAN_PAGE_SIZE: i64 = 100;

const SELECT_COLUMNS: &str = "position, file_name, modified_at, source_id, conversion_status,
     structured_ref, markup_ref, visual_ref, extraction_status";

/// Replace the registry with the given documents, newest first.
///
/// Positions are dense and 1-based. Every record starts NOT_STARTED with no renditions.
pub fn replace_registry(
    conn: &Connection,
    documents: &[SourceDocument],
) -> Result<usize, DatabaseError> {
    let mut sorted: Vec<&SourceDocument> = documents.iter().collect();
    sorted.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM file_registry", [])?;
    for (index, doc) in sorted.iter().enumerate() {
        tx.execute(
            "INSERT INTO file_registry (position, file_name, modified_at, source_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                index as i64 + 1,
                doc.name,
                doc.modified_at.format(DATETIME_FORMAT).to_string(),
                doc.id,
            ],
        )?;
    }
    tx.commit()?;
    Ok(sorted.len())
}

pub fn get_record(conn: &Connection, id: &str) -> Result<Option<SourceRecord>, DatabaseError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM file_registry WHERE source_id = ?1");
    let row = conn
        .query_row(&sql, params![id], read_registry_row)
        .optional()?;
    row.map(record_from_row).transpose()
}

pub fn count_records(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM file_registry", [], |row| row.get(0))?)
}

/// Set one status or reference column for a record.
///
/// Status columns only accept the four `ProcessingStatus` values. An empty
/// reference value clears the column.
pub fn upsert_status(
    conn: &Connection,
    id: &str,
    field: RegistryField,
    value: &str,
) -> Result<(), DatabaseError> {
    let stored: Option<&str> = match field.kind() {
        FieldKind::Status => Some(ProcessingStatus::from_str(value)?.as_str()),
        FieldKind::Reference => Some(value).filter(|v| !v.is_empty()),
    };

    // Column names come from the closed RegistryField set, never from input.
    let sql = format!(
        "UPDATE file_registry SET {} = ?1 WHERE source_id = ?2",
        field.as_str()
    );
    let changed = conn.execute(&sql, params![stored, id])?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "file_registry".into(),
            id: id.into(),
        });
    }
    Ok(())
}

/// Typed shortcut for status columns.
pub fn set_status(
    conn: &Connection,
    id: &str,
    field: RegistryField,
    status: ProcessingStatus,
) -> Result<(), DatabaseError> {
    upsert_status(conn, id, field, status.as_str())
}

/// Lazily scan the registry in position order, yielding records that match `predicate`.
///
/// Each call starts from the first row, so a scan can always be restarted.
/// Pages are read on demand, so status writes made while iterating are
/// visible to rows that have not been fetched yet.
pub fn scan<'c, P>(conn: &'c Connection, predicate: P) -> RegistryScan<'c, P>
where
    P: Fn(&SourceRecord) -> bool,
{
    RegistryScan {
        conn,
        predicate,
        last_position: 0,
        page: VecDeque::new(),
        exhausted: false,
    }
}

pub struct RegistryScan<'c, P> {
    conn: &'c Connection,
    predicate: P,
    last_position: i64,
    page: VecDeque<SourceRecord>,
    exhausted: bool,
}

impl<'c, P> RegistryScan<'c, P> {
    fn fetch_page(&mut self) -> Result<(), DatabaseError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM file_registry
             WHERE position > ?1 ORDER BY position ASC LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![self.last_position, SCAN_PAGE_SIZE], read_registry_row)?;

        let mut fetched = 0;
        for row in rows {
            let record = record_from_row(row?)?;
            self.last_position = record.position;
            self.page.push_back(record);
            fetched += 1;
        }
        if fetched < SCAN_PAGE_SIZE {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl<'c, P> Iterator for RegistryScan<'c, P>
where
    P: Fn(&SourceRecord) -> bool,
{
    type Item = Result<SourceRecord, DatabaseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.page.pop_front() {
                if (self.predicate)(&record) {
                    return Some(Ok(record));
                }
                continue;
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}

struct RegistryRow {
    position: i64,
    file_name: String,
    modified_at: String,
    source_id: String,
    conversion_status: String,
    structured_ref: Option<String>,
    markup_ref: Option<String>,
    visual_ref: Option<String>,
    extraction_status: String,
}

fn read_registry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RegistryRow> {
    Ok(RegistryRow {
        position: row.get(0)?,
        file_name: row.get(1)?,
        modified_at: row.get(2)?,
        source_id: row.get(3)?,
        conversion_status: row.get(4)?,
        structured_ref: row.get(5)?,
        markup_ref: row.get(6)?,
        visual_ref: row.get(7)?,
        extraction_status: row.get(8)?,
    })
}

fn record_from_row(row: RegistryRow) -> Result<SourceRecord, DatabaseError> {
    Ok(SourceRecord {
        position: row.position,
        id: row.source_id,
        name: row.file_name,
        modified_at: NaiveDateTime::parse_from_str(&row.modified_at, DATETIME_FORMAT)
            .unwrap_or_default(),
        conversion_status: ProcessingStatus::from_str(&row.conversion_status)?,
        structured_ref: row.structured_ref,
        markup_ref: row.markup_ref,
        visual_ref: row.visual_ref,
        extraction_status: ProcessingStatus::from_str(&row.extraction_status)?,
    })
}
