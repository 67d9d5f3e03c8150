//! Lifecycle guard: the sole enforcement point for interview state
//! transitions.
//!
//! States are {scheduled, started, completed}, initial scheduled,
//! terminal completed. `begin` and `complete` delegate the decision to
//! the store's atomic compare-and-set, so the guard is correct even
//! across independent process instances sharing one database; no
//! in-memory lock is involved. Only after the CAS has already failed
//! does the guard re-read the record, purely to name a specific reason.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{ApiError, DenyReason};
use crate::session::SessionStore;
use crate::store::{InterviewRecord, InterviewStatus, InterviewStore, TransitionOutcome};
use crate::window::{classify, Window};

/// Answer to a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReport {
    /// Stored status is terminal; the link is spent.
    Completed,
    /// Stored status says another session holds this interview.
    AlreadyStarted,
    /// The window has not opened yet.
    Waiting {
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        time_remaining: i64,
    },
    /// Inside the live window; carries the record for the interview page.
    Live(InterviewRecord),
    /// The window has closed unused.
    Expired,
}

/// Activate an interview: atomic scheduled -> started, then session init.
///
/// `questions` must already be generated before the transition is
/// attempted, so a failed generation never leaves a record stuck in
/// `started` with no session behind it. Returns the question list on
/// success so the caller can hand it straight to the client.
pub async fn begin(
    store: &dyn InterviewStore,
    sessions: &SessionStore,
    interview_id: &str,
    questions: Vec<String>,
    now: DateTime<Utc>,
) -> Result<Vec<String>, ApiError> {
    let outcome = store
        .transition(
            interview_id,
            InterviewStatus::Scheduled,
            InterviewStatus::Started,
            now,
        )
        .await
        .map_err(|e| ApiError::Persistence(e.to_string()))?;

    match outcome {
        TransitionOutcome::Applied => {
            if sessions.init(interview_id, questions.clone()).await.is_err() {
                // The CAS admitted us but a session is already live.
                // Should be unreachable; refuse rather than clobber it.
                return Err(ApiError::PreconditionFailed(DenyReason::AlreadyStarted));
            }
            info!("Interview {} started", interview_id);
            Ok(questions)
        }
        TransitionOutcome::PreconditionFailed => Err(deny_begin(store, interview_id).await?),
    }
}

/// Translate a failed begin CAS into a specific user-facing reason.
async fn deny_begin(store: &dyn InterviewStore, interview_id: &str) -> Result<ApiError, ApiError> {
    let record = store
        .get(interview_id)
        .await
        .map_err(|e| ApiError::Persistence(e.to_string()))?;

    let reason = match record.map(|r| r.status) {
        Some(InterviewStatus::Started) => DenyReason::AlreadyStarted,
        Some(InterviewStatus::Completed) => DenyReason::AlreadyCompleted,
        // A scheduled record whose CAS failed means we lost a race that
        // resolved between the UPDATE and this read.
        Some(InterviewStatus::Scheduled) => DenyReason::AlreadyStarted,
        None => DenyReason::LinkInvalid,
    };
    Ok(ApiError::PreconditionFailed(reason))
}

/// Finish an interview: atomic started -> completed.
///
/// Deliberately independent of the evaluation pipeline: completion
/// gates reuse of the link, evaluation gates scoring, and either can
/// fail without undoing the other.
pub async fn complete(
    store: &dyn InterviewStore,
    interview_id: &str,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    let outcome = store
        .transition(
            interview_id,
            InterviewStatus::Started,
            InterviewStatus::Completed,
            now,
        )
        .await
        .map_err(|e| ApiError::Persistence(e.to_string()))?;

    match outcome {
        TransitionOutcome::Applied => {
            info!("Interview {} completed", interview_id);
            Ok(())
        }
        TransitionOutcome::PreconditionFailed => {
            let record = store
                .get(interview_id)
                .await
                .map_err(|e| ApiError::Persistence(e.to_string()))?;

            let reason = match record.map(|r| r.status) {
                Some(InterviewStatus::Completed) => DenyReason::AlreadyCompleted,
                // Completing an interview that never started means the
                // caller is off the scripted flow entirely.
                Some(_) => DenyReason::LinkInvalid,
                None => return Err(ApiError::NotFound("interview")),
            };
            Err(ApiError::PreconditionFailed(reason))
        }
    }
}

/// Status query: stored state takes precedence over the clock.
///
/// A completed or started record short-circuits before the window is
/// even classified; only a still-scheduled record consults the clock.
pub async fn status(
    store: &dyn InterviewStore,
    interview_id: &str,
    now: DateTime<Utc>,
) -> Result<StatusReport, ApiError> {
    let record = store
        .get(interview_id)
        .await
        .map_err(|e| ApiError::Persistence(e.to_string()))?
        .ok_or(ApiError::NotFound("interview"))?;

    match record.status {
        InterviewStatus::Completed => Ok(StatusReport::Completed),
        InterviewStatus::Started => Ok(StatusReport::AlreadyStarted),
        InterviewStatus::Scheduled => {
            match classify(now, record.start_time, record.end_time) {
                Window::Waiting { seconds_until_start } => Ok(StatusReport::Waiting {
                    start_time: record.start_time,
                    end_time: record.end_time,
                    time_remaining: seconds_until_start,
                }),
                Window::Live => Ok(StatusReport::Live(record)),
                Window::Expired => Ok(StatusReport::Expired),
            }
        }
    }
}
