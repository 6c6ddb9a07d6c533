//! Job store: the single source of truth for job state.
//!
//! Every record lives behind its own lock, so updates to one job never
//! block readers or writers of another. The outer map is only write-locked
//! on `create`. When a database is attached, every mutation is written
//! through to it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::job_repo::{self, JobRow};
use crate::db::Database;
use crate::error::StoreError;

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of a job. `Pending` is the only initial state;
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// The legal transitions of the job state machine.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_status(s: &str, job_id: &str) -> JobStatus {
    match s {
        "pending" => JobStatus::Pending,
        "processing" => JobStatus::Processing,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        other => {
            log::warn!(
                "Unknown job status '{}' for job {}, defaulting to Pending",
                other,
                job_id
            );
            JobStatus::Pending
        }
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

// ============================================================================
// JobRecord
// ============================================================================

/// One document's end-to-end processing state.
///
/// Mutated exclusively through [`JobStore::update`]; all other components
/// only read snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Unique job identifier, assigned at creation, never reused.
    pub id: String,
    /// Original upload filename.
    pub filename: String,
    /// MIME type of the uploaded document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Spooled source artifact path.
    pub source_ref: String,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Label of the stage in progress or last attempted.
    pub current_stage: String,
    /// Overall progress in [0, 100], non-decreasing.
    pub progress_percent: u8,
    /// Error message, present only when `status` is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Produced artifact reference, present only when `status` is `Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Creates a fresh record in `Pending`.
    pub fn new(id: &str, filename: &str, mime_type: Option<String>, source_ref: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            filename: filename.to_string(),
            mime_type,
            source_ref: source_ref.to_string(),
            status: JobStatus::Pending,
            current_stage: "queued".to_string(),
            progress_percent: 0,
            error_detail: None,
            result_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Claims the job for execution. Returns false if it was already
    /// claimed or finished, making duplicate submits a no-op.
    pub fn begin_processing(&mut self, first_stage: &str) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }
        self.status = JobStatus::Processing;
        self.current_stage = first_stage.to_string();
        true
    }

    /// Records that a successor stage is now in progress.
    pub fn advance_stage(&mut self, stage: &str, progress: u8) {
        if !self.status.can_transition_to(JobStatus::Processing) {
            self.reject_transition("advance_stage");
            return;
        }
        self.status = JobStatus::Processing;
        self.current_stage = stage.to_string();
        // progress never regresses
        self.progress_percent = self.progress_percent.max(progress.min(100));
    }

    /// Terminal success: sets progress to 100 and stores the result reference.
    pub fn complete(&mut self, result_ref: &str) {
        if !self.status.can_transition_to(JobStatus::Completed) {
            self.reject_transition("complete");
            return;
        }
        self.status = JobStatus::Completed;
        self.progress_percent = 100;
        self.result_ref = Some(result_ref.to_string());
    }

    /// Terminal failure: records the stage-attributable error.
    /// Progress stays frozen at its last value.
    pub fn fail(&mut self, error: &str) {
        if !self.status.can_transition_to(JobStatus::Failed) {
            self.reject_transition("fail");
            return;
        }
        self.status = JobStatus::Failed;
        self.error_detail = Some(error.to_string());
    }

    /// An illegal transition is a programming error, never a user-visible
    /// outcome: loud in debug builds, logged and ignored in release.
    fn reject_transition(&self, attempted: &str) {
        log::error!(
            "Illegal transition '{}' for job {} in state {}",
            attempted,
            self.id,
            self.status
        );
        debug_assert!(
            false,
            "illegal transition '{}' from {}",
            attempted, self.status
        );
    }

    fn to_row(&self) -> JobRow {
        JobRow {
            id: self.id.clone(),
            filename: self.filename.clone(),
            mime_type: self.mime_type.clone(),
            source_ref: self.source_ref.clone(),
            status: self.status.as_str().to_string(),
            current_stage: self.current_stage.clone(),
            progress: self.progress_percent,
            error: self.error_detail.clone(),
            result_ref: self.result_ref.clone(),
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
        }
    }

    fn from_row(row: &JobRow) -> Self {
        Self {
            id: row.id.clone(),
            filename: row.filename.clone(),
            mime_type: row.mime_type.clone(),
            source_ref: row.source_ref.clone(),
            status: parse_status(&row.status, &row.id),
            current_stage: row.current_stage.clone(),
            progress_percent: row.progress.min(100),
            error_detail: row.error.clone(),
            result_ref: row.result_ref.clone(),
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}

// ============================================================================
// JobStore
// ============================================================================

type SharedRecord = Arc<RwLock<JobRecord>>;

/// In-memory registry of job records with optional write-through
/// persistence. Records are never deleted.
pub struct JobStore {
    jobs: RwLock<HashMap<String, SharedRecord>>,
    db: RwLock<Option<Database>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            db: RwLock::new(None),
        }
    }

    /// Attaches the database used for write-through persistence.
    pub fn set_database(&self, db: Database) {
        let mut guard = match self.db.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store DB lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        *guard = Some(db);
    }

    /// Gets a cloned database handle if available.
    pub fn database(&self) -> Option<Database> {
        let guard = match self.db.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store DB lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.clone()
    }

    /// Registers a new record. The record becomes visible to readers only
    /// once fully initialized and persisted; on any failure nothing is
    /// left behind.
    pub fn create(&self, record: JobRecord) -> Result<(), StoreError> {
        let id = record.id.clone();
        let mut jobs = self.write_map();
        if jobs.contains_key(&id) {
            return Err(StoreError::DuplicateId(id));
        }

        // Persist before publishing: a record a reader can see must never
        // turn into NotFound afterwards. The map write lock stays held so
        // no lookup observes the gap.
        if let Some(db) = self.database() {
            job_repo::insert(&db, &record.to_row()).map_err(StoreError::Database)?;
        }

        jobs.insert(id, Arc::new(RwLock::new(record)));
        Ok(())
    }

    /// Returns an owned snapshot of the record, falling back to the
    /// database for records not yet cached (e.g. after a restart without
    /// a warm load).
    pub fn get(&self, id: &str) -> Result<JobRecord, StoreError> {
        if let Some(entry) = self.entry(id) {
            return Ok(self.read_record(&entry));
        }

        if let Some(db) = self.database() {
            if let Ok(Some(row)) = job_repo::find_by_id(&db, id) {
                let record = JobRecord::from_row(&row);
                // Cache it so subsequent updates find it.
                self.write_map()
                    .entry(id.to_string())
                    .or_insert_with(|| Arc::new(RwLock::new(record.clone())));
                return Ok(record);
            }
        }

        Err(StoreError::NotFound(id.to_string()))
    }

    /// Alias of [`get`](Self::get), kept for contract clarity: readers
    /// always receive an immutable copy.
    pub fn snapshot(&self, id: &str) -> Result<JobRecord, StoreError> {
        self.get(id)
    }

    /// Atomic read-modify-write of a single record. Concurrent updates to
    /// the same job serialize; updates to different jobs proceed
    /// independently. Refreshes `updated_at` and writes through to the
    /// database.
    ///
    /// The write-through runs while the record's write lock is still held,
    /// so rows reach the database in the same order the mutations were
    /// applied in memory. A mutator that changes nothing persists nothing:
    /// a refused claim must never push a stale row over a newer one.
    pub fn update<F>(&self, id: &str, mutator: F) -> Result<JobRecord, StoreError>
    where
        F: FnOnce(&mut JobRecord),
    {
        let entry = match self.entry(id) {
            Some(e) => e,
            None => {
                // Pull into cache first so the mutation has a target.
                self.get(id)?;
                self.entry(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?
            }
        };

        let mut record = match entry.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job record lock for {} was poisoned, recovering", id);
                poisoned.into_inner()
            }
        };
        let before = record.clone();
        mutator(&mut record);
        if *record == before {
            return Ok(before);
        }
        record.updated_at = Utc::now();
        let updated = record.clone();

        if let Some(db) = self.database() {
            if let Err(e) = job_repo::update(&db, &updated.to_row()) {
                log::error!("Failed to persist job {} to database: {}", id, e);
            }
        }

        Ok(updated)
    }

    /// Returns snapshots of all records, newest first.
    pub fn all(&self) -> Vec<JobRecord> {
        let jobs = self.read_map();
        let mut records: Vec<JobRecord> =
            jobs.values().map(|e| self.read_record(e)).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Counts jobs by status: (pending, processing, completed, failed).
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let jobs = self.read_map();
        let mut counts = (0, 0, 0, 0);
        for entry in jobs.values() {
            match self.read_record(entry).status {
                JobStatus::Pending => counts.0 += 1,
                JobStatus::Processing => counts.1 += 1,
                JobStatus::Completed => counts.2 += 1,
                JobStatus::Failed => counts.3 += 1,
            }
        }
        counts
    }

    /// Warms the cache from the database on startup.
    pub fn load_from_database(&self) {
        let db = match self.database() {
            Some(db) => db,
            None => return,
        };

        let rows = match job_repo::list_all(&db) {
            Ok(rows) => rows,
            Err(e) => {
                log::error!("Failed to load jobs from database: {}", e);
                return;
            }
        };

        let mut loaded = 0;
        let mut jobs = self.write_map();
        for row in &rows {
            jobs.entry(row.id.clone()).or_insert_with(|| {
                loaded += 1;
                Arc::new(RwLock::new(JobRecord::from_row(row)))
            });
        }
        drop(jobs);

        log::info!("Loaded {} jobs from database into cache", loaded);
    }

    fn entry(&self, id: &str) -> Option<SharedRecord> {
        self.read_map().get(id).map(Arc::clone)
    }

    fn read_record(&self, entry: &SharedRecord) -> JobRecord {
        match entry.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => {
                log::warn!("Job record lock was poisoned, recovering");
                poisoned.into_inner().clone()
            }
        }
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, SharedRecord>> {
        match self.jobs.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store map lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_map(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SharedRecord>> {
        match self.jobs.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store map lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
