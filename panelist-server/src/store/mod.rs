//! Repository abstraction for interview records.
//!
//! This module defines the `InterviewStore` trait that abstracts
//! storage of interview records and persisted evaluations.
//! Implementations provide different backends (in-memory, SQLite).
//!
//! The linchpin of the whole service is `transition`: it must be a
//! single atomic compare-and-set against the backing store. A
//! read-then-write pair would reintroduce the double-start race this
//! component exists to prevent.

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteInterviewStore;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use panelist_core::{EvaluationResult, QaPair};

/// Lifecycle status of an interview record.
///
/// Transitions are monotonic and one-directional:
/// Scheduled -> Started -> Completed, with Completed terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterviewStatus {
    Scheduled,
    Started,
    Completed,
}

impl InterviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InterviewStatus::Scheduled => "scheduled",
            InterviewStatus::Started => "started",
            InterviewStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "scheduled" => Some(InterviewStatus::Scheduled),
            "started" => Some(InterviewStatus::Started),
            "completed" => Some(InterviewStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for InterviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One scheduled interview. Keyed uniquely by `interview_id`; never
/// deleted (the record is the audit trail). The id is the sole external
/// reference to the interview, so its secrecy is safety-critical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewRecord {
    pub interview_id: String,
    pub candidate_name: String,
    pub candidate_email: String,
    pub job_description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub interview_link: String,
    pub status: InterviewStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A persisted evaluation: the structured result plus the transcript it
/// was computed from. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvaluation {
    pub interview_id: String,
    pub transcript: Vec<QaPair>,
    pub result: EvaluationResult,
    pub evaluated_at: DateTime<Utc>,
}

/// Outcome of a conditional transition. The decision is made atomically
/// in the store; on `PreconditionFailed` the caller re-reads the record
/// to produce a specific user-facing reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    PreconditionFailed,
}

/// Storage-layer failures.
#[derive(Debug)]
pub enum StoreError {
    /// A record with this interview_id already exists.
    Duplicate,
    /// The backing store failed or is unreachable.
    Storage { operation: &'static str, detail: String },
    /// A persisted row could not be decoded.
    Corruption(&'static str),
}

impl StoreError {
    pub fn storage(operation: &'static str, detail: impl Into<String>) -> Self {
        StoreError::Storage {
            operation,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Duplicate => write!(f, "interview record already exists"),
            StoreError::Storage { operation, detail } => {
                write!(f, "storage failure during {}: {}", operation, detail)
            }
            StoreError::Corruption(what) => write!(f, "corrupt stored {}", what),
        }
    }
}

impl std::error::Error for StoreError {}

/// Repository trait for interview records and persisted evaluations.
#[async_trait]
pub trait InterviewStore: Send + Sync {
    /// Insert a new record. Fails with `Duplicate` on id collision.
    async fn create(&self, record: InterviewRecord) -> Result<(), StoreError>;

    /// Fetch a record by id, `None` if unknown.
    async fn get(&self, interview_id: &str) -> Result<Option<InterviewRecord>, StoreError>;

    /// Atomically move a record from `from` to `to`, stamping
    /// `started_at` or `completed_at` with `at` according to the target
    /// status. Returns `PreconditionFailed` (without mutating anything)
    /// when the record is missing or not currently in `from`.
    ///
    /// Must be linearizable with respect to every process sharing the
    /// store, not just threads within this one.
    async fn transition(
        &self,
        interview_id: &str,
        from: InterviewStatus,
        to: InterviewStatus,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, StoreError>;

    /// Append a computed evaluation. Never overwrites earlier rows.
    async fn save_evaluation(&self, evaluation: StoredEvaluation) -> Result<(), StoreError>;

    /// Most recently appended evaluation for an interview, if any.
    async fn evaluation_for(
        &self,
        interview_id: &str,
    ) -> Result<Option<StoredEvaluation>, StoreError>;
}
