//! SQLite implementation of `InterviewStore`.
//!
//! Durable storage that survives restarts. Uses a `Mutex<Connection>`
//! because `rusqlite::Connection` is not `Sync`, and wraps every
//! operation in `tokio::task::spawn_blocking` so synchronous rusqlite
//! calls never block the async runtime.
//!
//! # Schema Versioning
//!
//! The database uses SQLite's `user_version` pragma to track schema
//! versions. When the schema changes, increment `SCHEMA_VERSION` and add
//! a migration function in `run_migrations`.
//!
//! # Atomicity
//!
//! The lifecycle compare-and-set is a single conditional UPDATE whose
//! WHERE clause matches both the interview id and the required current
//! status. SQLite applies the statement atomically, so two concurrent
//! `begin` attempts can never both observe one changed row.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    InterviewRecord, InterviewStatus, InterviewStore, StoreError, StoredEvaluation,
    TransitionOutcome,
};

/// Current schema version. Increment when making schema changes.
const SCHEMA_VERSION: i32 = 1;

/// SQLite-backed interview store.
pub struct SqliteInterviewStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteInterviewStore {
    /// Open (or create) the database at the given path.
    ///
    /// The database is configured with `journal_mode = WAL` for crash
    /// safety under concurrent access, and a 5s busy timeout.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| StoreError::storage("open database", e.to_string()))?;

        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::storage("set journal_mode", e.to_string()))?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))
            .map_err(|e| StoreError::storage("set busy_timeout", e.to_string()))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory database, for tests.
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::storage("open in-memory database", e.to_string()))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("mutex poisoned");

        let current_version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(|e| StoreError::storage("read schema version", e.to_string()))?;

        if current_version > SCHEMA_VERSION {
            return Err(StoreError::storage(
                "check schema version",
                format!(
                    "database schema version {} is newer than supported version {}",
                    current_version, SCHEMA_VERSION
                ),
            ));
        }

        if current_version < SCHEMA_VERSION {
            Self::run_migrations(&conn, current_version)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .map_err(|e| StoreError::storage("update schema version", e.to_string()))?;
        }

        Ok(())
    }

    fn run_migrations(conn: &Connection, from_version: i32) -> Result<(), StoreError> {
        if from_version < 1 {
            Self::migrate_v0_to_v1(conn)?;
        }
        Ok(())
    }

    fn migrate_v0_to_v1(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS interviews (
                interview_id TEXT PRIMARY KEY,
                candidate_name TEXT NOT NULL,
                candidate_email TEXT NOT NULL,
                job_description TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                interview_link TEXT NOT NULL,
                status TEXT NOT NULL CHECK(status IN (
                    'scheduled', 'started', 'completed'
                )),
                started_at TEXT,
                completed_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS interview_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                interview_id TEXT NOT NULL,
                transcript_json TEXT NOT NULL,
                result_json TEXT NOT NULL,
                evaluated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_results_interview
            ON interview_results(interview_id);
            "#,
        )
        .map_err(|e| StoreError::storage("create initial schema", e.to_string()))?;

        Ok(())
    }
}

fn timestamp_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn timestamp_from_sql(raw: &str, what: &'static str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Corruption(what))
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        interview_id: row.get(0)?,
        candidate_name: row.get(1)?,
        candidate_email: row.get(2)?,
        job_description: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        interview_link: row.get(6)?,
        status: row.get(7)?,
        started_at: row.get(8)?,
        completed_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Row image before timestamp/status decoding.
struct RawRecord {
    interview_id: String,
    candidate_name: String,
    candidate_email: String,
    job_description: String,
    start_time: String,
    end_time: String,
    interview_link: String,
    status: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    created_at: String,
}

impl RawRecord {
    fn decode(self) -> Result<InterviewRecord, StoreError> {
        Ok(InterviewRecord {
            status: InterviewStatus::parse(&self.status)
                .ok_or(StoreError::Corruption("interview status"))?,
            start_time: timestamp_from_sql(&self.start_time, "start_time")?,
            end_time: timestamp_from_sql(&self.end_time, "end_time")?,
            started_at: self
                .started_at
                .as_deref()
                .map(|s| timestamp_from_sql(s, "started_at"))
                .transpose()?,
            completed_at: self
                .completed_at
                .as_deref()
                .map(|s| timestamp_from_sql(s, "completed_at"))
                .transpose()?,
            created_at: timestamp_from_sql(&self.created_at, "created_at")?,
            interview_id: self.interview_id,
            candidate_name: self.candidate_name,
            candidate_email: self.candidate_email,
            job_description: self.job_description,
            interview_link: self.interview_link,
        })
    }
}

const SELECT_RECORD: &str = "SELECT interview_id, candidate_name, candidate_email, \
     job_description, start_time, end_time, interview_link, status, \
     started_at, completed_at, created_at \
     FROM interviews WHERE interview_id = ?1";

#[async_trait]
impl InterviewStore for SqliteInterviewStore {
    async fn create(&self, record: InterviewRecord) -> Result<(), StoreError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("mutex poisoned");

            let result = conn.execute(
                "INSERT INTO interviews (interview_id, candidate_name, candidate_email, \
                 job_description, start_time, end_time, interview_link, status, \
                 started_at, completed_at, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.interview_id,
                    record.candidate_name,
                    record.candidate_email,
                    record.job_description,
                    timestamp_to_sql(record.start_time),
                    timestamp_to_sql(record.end_time),
                    record.interview_link,
                    record.status.as_str(),
                    record.started_at.map(timestamp_to_sql),
                    record.completed_at.map(timestamp_to_sql),
                    timestamp_to_sql(record.created_at),
                ],
            );

            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::Duplicate)
                }
                Err(e) => Err(StoreError::storage("create", e.to_string())),
            }
        })
        .await
        .map_err(|e| StoreError::storage("create", e.to_string()))?
    }

    async fn get(&self, interview_id: &str) -> Result<Option<InterviewRecord>, StoreError> {
        let conn = self.conn.clone();
        let id = interview_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("mutex poisoned");

            let raw = conn
                .query_row(SELECT_RECORD, params![id], row_to_record)
                .optional()
                .map_err(|e| StoreError::storage("get", e.to_string()))?;

            raw.map(RawRecord::decode).transpose()
        })
        .await
        .map_err(|e| StoreError::storage("get", e.to_string()))?
    }

    async fn transition(
        &self,
        interview_id: &str,
        from: InterviewStatus,
        to: InterviewStatus,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, StoreError> {
        let conn = self.conn.clone();
        let id = interview_id.to_string();
        let stamp = timestamp_to_sql(at);

        // Which nullable timestamp the target status stamps.
        let started_stamp = (to == InterviewStatus::Started).then(|| stamp.clone());
        let completed_stamp = (to == InterviewStatus::Completed).then(|| stamp.clone());

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("mutex poisoned");

            // Single conditional UPDATE: the find-matching-and-update
            // happens in one atomic statement.
            let changed = conn
                .execute(
                    "UPDATE interviews \
                     SET status = ?1, \
                         started_at = COALESCE(?2, started_at), \
                         completed_at = COALESCE(?3, completed_at) \
                     WHERE interview_id = ?4 AND status = ?5",
                    params![to.as_str(), started_stamp, completed_stamp, id, from.as_str()],
                )
                .map_err(|e| StoreError::storage("transition", e.to_string()))?;

            if changed == 1 {
                Ok(TransitionOutcome::Applied)
            } else {
                Ok(TransitionOutcome::PreconditionFailed)
            }
        })
        .await
        .map_err(|e| StoreError::storage("transition", e.to_string()))?
    }

    async fn save_evaluation(&self, evaluation: StoredEvaluation) -> Result<(), StoreError> {
        let conn = self.conn.clone();

        let transcript_json = serde_json::to_string(&evaluation.transcript)
            .map_err(|e| StoreError::storage("serialize transcript", e.to_string()))?;
        let result_json = serde_json::to_string(&evaluation.result)
            .map_err(|e| StoreError::storage("serialize evaluation", e.to_string()))?;

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("mutex poisoned");

            conn.execute(
                "INSERT INTO interview_results (interview_id, transcript_json, \
                 result_json, evaluated_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    evaluation.interview_id,
                    transcript_json,
                    result_json,
                    timestamp_to_sql(evaluation.evaluated_at),
                ],
            )
            .map_err(|e| StoreError::storage("save evaluation", e.to_string()))?;

            Ok(())
        })
        .await
        .map_err(|e| StoreError::storage("save evaluation", e.to_string()))?
    }

    async fn evaluation_for(
        &self,
        interview_id: &str,
    ) -> Result<Option<StoredEvaluation>, StoreError> {
        let conn = self.conn.clone();
        let id = interview_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("mutex poisoned");

            let row: Option<(String, String, String)> = conn
                .query_row(
                    "SELECT transcript_json, result_json, evaluated_at \
                     FROM interview_results WHERE interview_id = ?1 \
                     ORDER BY id DESC LIMIT 1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
                .map_err(|e| StoreError::storage("load evaluation", e.to_string()))?;

            match row {
                Some((transcript_json, result_json, evaluated_at)) => {
                    let transcript = serde_json::from_str(&transcript_json)
                        .map_err(|_| StoreError::Corruption("transcript JSON"))?;
                    let result = serde_json::from_str(&result_json)
                        .map_err(|_| StoreError::Corruption("evaluation JSON"))?;
                    Ok(Some(StoredEvaluation {
                        interview_id: id,
                        transcript,
                        result,
                        evaluated_at: timestamp_from_sql(&evaluated_at, "evaluated_at")?,
                    }))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| StoreError::storage("load evaluation", e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use panelist_core::{EvaluationResult, QaPair, Recommendation};

    fn test_record(id: &str) -> InterviewRecord {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        InterviewRecord {
            interview_id: id.to_string(),
            candidate_name: "Ada".to_string(),
            candidate_email: "ada@example.com".to_string(),
            job_description: "Rust engineer".to_string(),
            start_time: start,
            end_time: start + Duration::seconds(3600),
            interview_link: format!("http://localhost:3000/interview?id={}", id),
            status: InterviewStatus::Scheduled,
            started_at: None,
            completed_at: None,
            created_at: start - Duration::days(1),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = SqliteInterviewStore::new_in_memory().unwrap();
        let record = test_record("iv-1");
        store.create(record.clone()).await.unwrap();

        let fetched = store.get("iv-1").await.unwrap().unwrap();
        assert_eq!(fetched, record);
        assert_eq!(fetched.status, InterviewStatus::Scheduled);
        assert!(fetched.started_at.is_none());
        assert!(fetched.start_time < fetched.end_time);
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = SqliteInterviewStore::new_in_memory().unwrap();
        store.create(test_record("iv-1")).await.unwrap();
        let err = store.create(test_record("iv-1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
    }

    #[tokio::test]
    async fn unknown_id_is_none() {
        let store = SqliteInterviewStore::new_in_memory().unwrap();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transition_stamps_started_at() {
        let store = SqliteInterviewStore::new_in_memory().unwrap();
        store.create(test_record("iv-1")).await.unwrap();

        let now = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        let outcome = store
            .transition("iv-1", InterviewStatus::Scheduled, InterviewStatus::Started, now)
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Applied);

        let record = store.get("iv-1").await.unwrap().unwrap();
        assert_eq!(record.status, InterviewStatus::Started);
        assert_eq!(record.started_at, Some(now));
        assert!(record.completed_at.is_none());
    }

    #[tokio::test]
    async fn transition_from_wrong_state_fails_without_mutation() {
        let store = SqliteInterviewStore::new_in_memory().unwrap();
        store.create(test_record("iv-1")).await.unwrap();

        let now = Utc::now();
        // Not started yet, so completing must fail.
        let outcome = store
            .transition("iv-1", InterviewStatus::Started, InterviewStatus::Completed, now)
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::PreconditionFailed);

        let record = store.get("iv-1").await.unwrap().unwrap();
        assert_eq!(record.status, InterviewStatus::Scheduled);
        assert!(record.completed_at.is_none());
    }

    #[tokio::test]
    async fn transition_on_unknown_id_is_precondition_failure() {
        let store = SqliteInterviewStore::new_in_memory().unwrap();
        let outcome = store
            .transition("missing", InterviewStatus::Scheduled, InterviewStatus::Started, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::PreconditionFailed);
    }

    #[tokio::test]
    async fn concurrent_begin_admits_exactly_one() {
        let store = std::sync::Arc::new(SqliteInterviewStore::new_in_memory().unwrap());
        store.create(test_record("iv-1")).await.unwrap();

        let now = Utc::now();
        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .transition("iv-1", InterviewStatus::Scheduled, InterviewStatus::Started, now)
                    .await
                    .unwrap()
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .transition("iv-1", InterviewStatus::Scheduled, InterviewStatus::Started, now)
                    .await
                    .unwrap()
            })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        let applied = [a, b]
            .iter()
            .filter(|o| **o == TransitionOutcome::Applied)
            .count();
        assert_eq!(applied, 1, "exactly one concurrent begin may win");
    }

    #[tokio::test]
    async fn second_complete_fails() {
        let store = SqliteInterviewStore::new_in_memory().unwrap();
        store.create(test_record("iv-1")).await.unwrap();

        let now = Utc::now();
        store
            .transition("iv-1", InterviewStatus::Scheduled, InterviewStatus::Started, now)
            .await
            .unwrap();

        let first = store
            .transition("iv-1", InterviewStatus::Started, InterviewStatus::Completed, now)
            .await
            .unwrap();
        let second = store
            .transition("iv-1", InterviewStatus::Started, InterviewStatus::Completed, now)
            .await
            .unwrap();

        assert_eq!(first, TransitionOutcome::Applied);
        assert_eq!(second, TransitionOutcome::PreconditionFailed);
    }

    #[tokio::test]
    async fn evaluations_append_and_latest_wins() {
        let store = SqliteInterviewStore::new_in_memory().unwrap();

        let transcript = vec![QaPair {
            question: "What is X?".to_string(),
            answer: "A thing.".to_string(),
        }];
        let mut evaluation = StoredEvaluation {
            interview_id: "iv-1".to_string(),
            transcript,
            result: EvaluationResult {
                technical_score: 6,
                communication_score: 7,
                overall_score: 6,
                recommendation: Recommendation::Maybe,
                feedback: "fine".to_string(),
            },
            evaluated_at: Utc.timestamp_opt(1_700_000_500, 0).unwrap(),
        };
        store.save_evaluation(evaluation.clone()).await.unwrap();

        evaluation.result.overall_score = 8;
        evaluation.evaluated_at = Utc.timestamp_opt(1_700_000_900, 0).unwrap();
        store.save_evaluation(evaluation.clone()).await.unwrap();

        let latest = store.evaluation_for("iv-1").await.unwrap().unwrap();
        assert_eq!(latest.result.overall_score, 8);
        assert_eq!(latest.evaluated_at, evaluation.evaluated_at);
    }
}
