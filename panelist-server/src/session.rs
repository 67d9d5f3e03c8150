//! In-memory question/answer sequencing for active interviews.
//!
//! The session map is the only process-wide mutable state in the
//! service. It is process-lifetime-bound: sessions are not persisted
//! and do not survive a restart. Each session sits behind its own
//! `tokio::sync::Mutex`, so overlapping requests against one interview
//! (a retried next-question call, say) are serialized while distinct
//! interviews proceed independently.
//!
//! A session exists only between a successful `begin` transition and
//! teardown. Teardown happens explicitly after evaluation, or through
//! the reaper once the record's live window has long passed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use panelist_core::QaPair;

use crate::store::InterviewStore;

/// How long after a record's end time an abandoned session survives
/// before the reaper removes it.
const REAP_GRACE: Duration = Duration::hours(1);

/// How often the reaper sweeps.
const REAP_INTERVAL_SECS: u64 = 60;

/// Session-engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// No session for this interview id; `begin` has not succeeded.
    NotFound,
    /// A session already exists for this id. The lifecycle guard's
    /// compare-and-set should make this unreachable; rejecting here is
    /// an independent second line against double-init.
    AlreadyActive,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotFound => write!(f, "interview session not found"),
            SessionError::AlreadyActive => write!(f, "interview session already active"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Result of asking for the next question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextQuestion {
    Question {
        question: String,
        /// 1-based position of this question.
        number: usize,
        total: usize,
    },
    /// The cursor reached the end of the sequence.
    Done,
}

struct Session {
    questions: Vec<String>,
    cursor: usize,
    transcript: Vec<QaPair>,
}

/// Process-wide map of active sessions, keyed by interview id.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize a session with cursor 0. Fails if one already exists.
    pub async fn init(&self, interview_id: &str, questions: Vec<String>) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(interview_id) {
            return Err(SessionError::AlreadyActive);
        }
        sessions.insert(
            interview_id.to_string(),
            Arc::new(Mutex::new(Session {
                questions,
                cursor: 0,
                transcript: Vec::new(),
            })),
        );
        Ok(())
    }

    async fn session(&self, interview_id: &str) -> Result<Arc<Mutex<Session>>, SessionError> {
        let sessions = self.sessions.read().await;
        sessions.get(interview_id).cloned().ok_or(SessionError::NotFound)
    }

    /// Return the question at the cursor and advance it.
    pub async fn next(&self, interview_id: &str) -> Result<NextQuestion, SessionError> {
        let session = self.session(interview_id).await?;
        let mut session = session.lock().await;

        if session.cursor >= session.questions.len() {
            return Ok(NextQuestion::Done);
        }

        let question = session.questions[session.cursor].clone();
        session.cursor += 1;
        Ok(NextQuestion::Question {
            question,
            number: session.cursor,
            total: session.questions.len(),
        })
    }

    /// Append a (question, answer) pair to the transcript.
    ///
    /// The pair is recorded verbatim; it is not checked against the
    /// most recently issued question. Documented behavior, preserved
    /// from the original design.
    pub async fn record_answer(
        &self,
        interview_id: &str,
        question: String,
        answer: String,
    ) -> Result<(), SessionError> {
        let session = self.session(interview_id).await?;
        let mut session = session.lock().await;
        session.transcript.push(QaPair { question, answer });
        Ok(())
    }

    /// Snapshot of the transcript recorded so far.
    pub async fn transcript(&self, interview_id: &str) -> Result<Vec<QaPair>, SessionError> {
        let session = self.session(interview_id).await?;
        let session = session.lock().await;
        Ok(session.transcript.clone())
    }

    /// Remove the session. Idempotent: a missing session is a no-op.
    pub async fn teardown(&self, interview_id: &str) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(interview_id).is_some() {
            info!("Tore down session for interview {}", interview_id);
        }
    }

    /// Ids of all live sessions, for the reaper sweep.
    pub async fn active_ids(&self) -> Vec<String> {
        let sessions = self.sessions.read().await;
        sessions.keys().cloned().collect()
    }
}

/// Background sweep removing sessions whose interview window closed
/// more than [`REAP_GRACE`] ago. Without this, a session abandoned
/// mid-interview would leak for the life of the process.
pub async fn reaper_loop(sessions: Arc<SessionStore>, store: Arc<dyn InterviewStore>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(REAP_INTERVAL_SECS));

    loop {
        interval.tick().await;
        reap_expired_sessions(&sessions, store.as_ref()).await;
    }
}

async fn reap_expired_sessions(sessions: &SessionStore, store: &dyn InterviewStore) {
    let now = Utc::now();

    for interview_id in sessions.active_ids().await {
        match store.get(&interview_id).await {
            Ok(Some(record)) => {
                if now > record.end_time + REAP_GRACE {
                    warn!(
                        "Reaping abandoned session for interview {} (window closed {})",
                        interview_id, record.end_time
                    );
                    sessions.teardown(&interview_id).await;
                }
            }
            Ok(None) => {
                // Session without a backing record should not happen;
                // drop it rather than leak it.
                warn!("Reaping session with no record: {}", interview_id);
                sessions.teardown(&interview_id).await;
            }
            Err(e) => {
                error!("Reaper could not load record {}: {}", interview_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, InterviewRecord, InterviewStatus};

    fn questions() -> Vec<String> {
        vec!["Q1".to_string(), "Q2".to_string()]
    }

    #[tokio::test]
    async fn next_walks_the_sequence_then_reports_done() {
        let store = SessionStore::new();
        store.init("iv-1", questions()).await.unwrap();

        assert_eq!(
            store.next("iv-1").await.unwrap(),
            NextQuestion::Question {
                question: "Q1".to_string(),
                number: 1,
                total: 2
            }
        );
        assert_eq!(
            store.next("iv-1").await.unwrap(),
            NextQuestion::Question {
                question: "Q2".to_string(),
                number: 2,
                total: 2
            }
        );
        assert_eq!(store.next("iv-1").await.unwrap(), NextQuestion::Done);
        // Cursor stays clamped at the end.
        assert_eq!(store.next("iv-1").await.unwrap(), NextQuestion::Done);
    }

    #[tokio::test]
    async fn second_init_is_rejected() {
        let store = SessionStore::new();
        store.init("iv-1", questions()).await.unwrap();
        assert_eq!(
            store.init("iv-1", questions()).await.unwrap_err(),
            SessionError::AlreadyActive
        );
    }

    #[tokio::test]
    async fn operations_on_unknown_id_are_not_found() {
        let store = SessionStore::new();
        assert_eq!(store.next("nope").await.unwrap_err(), SessionError::NotFound);
        assert_eq!(
            store
                .record_answer("nope", "q".to_string(), "a".to_string())
                .await
                .unwrap_err(),
            SessionError::NotFound
        );
        assert_eq!(store.transcript("nope").await.unwrap_err(), SessionError::NotFound);
    }

    #[tokio::test]
    async fn answers_accumulate_in_order() {
        let store = SessionStore::new();
        store.init("iv-1", questions()).await.unwrap();

        store
            .record_answer("iv-1", "Q1".to_string(), "A1".to_string())
            .await
            .unwrap();
        store
            .record_answer("iv-1", "Q2".to_string(), "A2".to_string())
            .await
            .unwrap();

        let transcript = store.transcript("iv-1").await.unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].question, "Q1");
        assert_eq!(transcript[1].answer, "A2");
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let store = SessionStore::new();
        store.init("iv-1", questions()).await.unwrap();
        store.teardown("iv-1").await;
        store.teardown("iv-1").await;
        assert_eq!(store.next("iv-1").await.unwrap_err(), SessionError::NotFound);
    }

    #[tokio::test]
    async fn reaper_removes_long_expired_sessions_only() {
        let sessions = SessionStore::new();
        let store = InMemoryStore::new();

        let now = Utc::now();
        let expired_end = now - Duration::hours(2);
        let live_end = now + Duration::hours(1);

        for (id, end) in [("old", expired_end), ("live", live_end)] {
            let start = end - Duration::hours(1);
            store
                .create(InterviewRecord {
                    interview_id: id.to_string(),
                    candidate_name: "Ada".to_string(),
                    candidate_email: "ada@example.com".to_string(),
                    job_description: "role".to_string(),
                    start_time: start,
                    end_time: end,
                    interview_link: String::new(),
                    status: InterviewStatus::Started,
                    started_at: Some(start),
                    completed_at: None,
                    created_at: start,
                })
                .await
                .unwrap();
            sessions.init(id, questions()).await.unwrap();
        }

        reap_expired_sessions(&sessions, &store).await;

        assert_eq!(sessions.next("old").await.unwrap_err(), SessionError::NotFound);
        assert!(sessions.next("live").await.is_ok());
    }

    #[tokio::test]
    async fn reaper_drops_sessions_without_a_record() {
        let sessions = SessionStore::new();
        let store = InMemoryStore::new();
        sessions.init("orphan", questions()).await.unwrap();

        reap_expired_sessions(&sessions, &store).await;

        assert_eq!(
            sessions.next("orphan").await.unwrap_err(),
            SessionError::NotFound
        );
    }

    #[test]
    fn reap_grace_is_one_hour() {
        assert_eq!(REAP_GRACE.num_minutes(), 60);
    }
}
