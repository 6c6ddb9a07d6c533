//! Job repository — CRUD operations for the `jobs` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub source_ref: String,
    pub status: String,
    pub current_stage: String,
    pub progress: u8,
    pub error: Option<String>,
    pub result_ref: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            mime_type: row.get("mime_type")?,
            source_ref: row.get("source_ref")?,
            status: row.get("status")?,
            current_stage: row.get("current_stage")?,
            progress: row.get("progress")?,
            error: row.get("error")?,
            result_ref: row.get("result_ref")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, filename, mime_type, source_ref, status, current_stage,
             progress, error, result_ref, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                job.id,
                job.filename,
                job.mime_type,
                job.source_ref,
                job.status,
                job.current_stage,
                job.progress,
                job.error,
                job.result_ref,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Updates an existing job row. All fields except `id` and `created_at`
/// are overwritten.
pub fn update(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET filename=?2, mime_type=?3, source_ref=?4, status=?5,
             current_stage=?6, progress=?7, error=?8, result_ref=?9, updated_at=?10
             WHERE id=?1",
            params![
                job.id,
                job.filename,
                job.mime_type,
                job.source_ref,
                job.status,
                job.current_stage,
                job.progress,
                job.error,
                job.result_ref,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job row by id.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    })
}

/// Returns all job rows, newest first.
pub fn list_all(db: &Database) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs ORDER BY created_at DESC")?;
        let rows = stmt.query_map([], JobRow::from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    })
}

/// Counts job rows with the given status string.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
