//! HTTP surface of the interview service.
//!
//! Every handler converts failures into the [`ApiError`] taxonomy; the
//! response body is always `{status, message}` JSON (plus payload
//! fields on success). Timestamps cross this boundary as ISO-8601, with
//! a trailing `Z` accepted.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use panelist_core::evaluation::{
    evaluation_prompt, parse_evaluation, EVALUATION_TEMPERATURE, EVALUATOR_SYSTEM_PROMPT,
};
use panelist_core::llm::LlmError;
use panelist_core::questions::{question_prompt, parse_questions, INTERVIEWER_SYSTEM_PROMPT};

use crate::error::{ApiError, DenyReason};
use crate::guard::{self, StatusReport};
use crate::mailer::{invitation_body, INVITATION_SUBJECT};
use crate::session::{NextQuestion, SessionError};
use crate::store::{InterviewRecord, InterviewStatus, StoredEvaluation};
use crate::uploader::recording_filename;
use crate::window::parse_utc_timestamp;
use crate::AppState;

/// Temperature for the question-generation call.
const QUESTION_TEMPERATURE: f32 = 0.4;

pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/scheduler/schedule", post(schedule))
        .route("/api/scheduler/status", get(status))
        .route("/api/scheduler/interview-data", get(interview_data))
        .route("/api/interviews/begin/:id", post(begin))
        .route("/api/interviews/next-question/:id", get(next_question))
        .route("/api/interviews/submit-answer/:id", post(submit_answer))
        .route("/api/interviews/evaluate/:id", get(evaluate))
        .route("/api/interviews/result/:id", get(result))
        .route("/api/interviews/complete/:id", post(complete))
        .route("/api/interviews/cleanup/:id", post(cleanup))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "panelist" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleRequest {
    candidate_name: String,
    candidate_email: String,
    job_description: String,
    start_time: String,
    end_time: String,
}

async fn schedule(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScheduleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    for (field, value) in [
        ("candidateName", &request.candidate_name),
        ("candidateEmail", &request.candidate_email),
        ("jobDescription", &request.job_description),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::Validation(format!("{} is required", field)));
        }
    }

    let start_time = parse_utc_timestamp(&request.start_time)
        .ok_or_else(|| ApiError::Validation("startTime is not a valid timestamp".to_string()))?;
    let end_time = parse_utc_timestamp(&request.end_time)
        .ok_or_else(|| ApiError::Validation("endTime is not a valid timestamp".to_string()))?;

    if start_time >= end_time {
        return Err(ApiError::Validation(
            "startTime must be before endTime".to_string(),
        ));
    }

    let interview_id = Uuid::new_v4().to_string();
    let interview_link = state.interview_link(&interview_id);

    let record = InterviewRecord {
        interview_id: interview_id.clone(),
        candidate_name: request.candidate_name.trim().to_string(),
        candidate_email: request.candidate_email.trim().to_string(),
        job_description: request.job_description.clone(),
        start_time,
        end_time,
        interview_link: interview_link.clone(),
        status: InterviewStatus::Scheduled,
        started_at: None,
        completed_at: None,
        created_at: Utc::now(),
    };

    // The record is the source of truth: a store failure fails the
    // whole scheduling request.
    state
        .store
        .create(record.clone())
        .await
        .map_err(|e| ApiError::Persistence(e.to_string()))?;

    info!("Scheduled interview {} for {}", interview_id, record.candidate_email);

    // Invitation delivery is non-fatal.
    match &state.mailer {
        Some(mailer) => {
            let body = invitation_body(
                &record.candidate_name,
                &interview_link,
                start_time,
                end_time,
            );
            if let Err(e) = mailer.send(&record.candidate_email, INVITATION_SUBJECT, &body).await {
                error!("Failed to send invitation for {}: {}", interview_id, e);
            }
        }
        None => warn!("Mail not configured; skipping invitation for {}", interview_id),
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "Interview scheduled successfully",
            "interviewId": interview_id,
            "interviewLink": interview_link,
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct IdQuery {
    id: Option<String>,
}

fn require_id(query: IdQuery) -> Result<String, ApiError> {
    query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Interview ID required".to_string()))
}

async fn status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let interview_id = require_id(query)?;
    let report = guard::status(state.store.as_ref(), &interview_id, Utc::now()).await?;

    let body = match report {
        StatusReport::Completed => json!({
            "status": "completed",
            "message": "Interview already completed",
        }),
        StatusReport::AlreadyStarted => json!({
            "status": "already_started",
            "message": "Interview already in progress",
        }),
        StatusReport::Waiting {
            start_time,
            end_time,
            time_remaining,
        } => json!({
            "status": "waiting",
            "start_time": start_time.to_rfc3339(),
            "end_time": end_time.to_rfc3339(),
            "time_remaining": time_remaining,
        }),
        StatusReport::Live(record) => json!({
            "status": "live",
            "interviewId": record.interview_id,
            "candidateName": record.candidate_name,
            "candidateEmail": record.candidate_email,
            "jobDescription": record.job_description,
        }),
        StatusReport::Expired => json!({
            "status": "expired",
            "message": "Interview window has closed",
        }),
    };
    Ok(Json(body))
}

async fn interview_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let interview_id = require_id(query)?;
    let record = state
        .store
        .get(&interview_id)
        .await
        .map_err(|e| ApiError::Persistence(e.to_string()))?
        .ok_or(ApiError::NotFound("interview"))?;

    Ok(Json(json!({
        "status": "success",
        "data": {
            "interviewId": record.interview_id,
            "candidateName": record.candidate_name,
            "candidateEmail": record.candidate_email,
            "jobDescription": record.job_description,
            "startTime": record.start_time.to_rfc3339(),
            "endTime": record.end_time.to_rfc3339(),
            "interviewLink": record.interview_link,
        },
    })))
}

async fn begin(
    State(state): State<Arc<AppState>>,
    Path(interview_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    // Cheap pre-check so an obviously spent link never costs an LLM
    // call. The authoritative decision is still the compare-and-set
    // inside the guard.
    let record = state
        .store
        .get(&interview_id)
        .await
        .map_err(|e| ApiError::Persistence(e.to_string()))?
        .ok_or(ApiError::PreconditionFailed(DenyReason::LinkInvalid))?;

    match record.status {
        InterviewStatus::Started => {
            return Err(ApiError::PreconditionFailed(DenyReason::AlreadyStarted))
        }
        InterviewStatus::Completed => {
            return Err(ApiError::PreconditionFailed(DenyReason::AlreadyCompleted))
        }
        InterviewStatus::Scheduled => {}
    }

    // Questions are generated before the transition: a failed
    // generation leaves the record untouched and startable.
    let raw = state
        .llm
        .generate(
            INTERVIEWER_SYSTEM_PROMPT,
            &question_prompt(&record.job_description),
            QUESTION_TEMPERATURE,
        )
        .await
        .map_err(llm_error)?;

    let questions = parse_questions(&raw);
    if questions.is_empty() {
        return Err(ApiError::Parse(
            "question generation returned no usable questions".to_string(),
        ));
    }

    let questions = guard::begin(
        state.store.as_ref(),
        &state.sessions,
        &interview_id,
        questions,
        Utc::now(),
    )
    .await?;

    Ok(Json(json!({
        "status": "success",
        "total": questions.len(),
        "questions": questions,
    })))
}

async fn next_question(
    State(state): State<Arc<AppState>>,
    Path(interview_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = match state.sessions.next(&interview_id).await.map_err(session_error)? {
        NextQuestion::Question {
            question,
            number,
            total,
        } => json!({
            "done": false,
            "question": question,
            "questionNumber": number,
            "totalQuestions": total,
        }),
        NextQuestion::Done => json!({ "done": true, "question": "" }),
    };
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
struct AnswerRequest {
    question: String,
    answer: String,
}

async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(interview_id): Path<String>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.question.trim().is_empty() || request.answer.trim().is_empty() {
        return Err(ApiError::Validation(
            "Question and answer required".to_string(),
        ));
    }

    state
        .sessions
        .record_answer(&interview_id, request.question, request.answer)
        .await
        .map_err(session_error)?;

    Ok(Json(json!({
        "status": "success",
        "message": "Answer recorded",
    })))
}

async fn evaluate(
    State(state): State<Arc<AppState>>,
    Path(interview_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let transcript = state
        .sessions
        .transcript(&interview_id)
        .await
        .map_err(session_error)?;

    if transcript.is_empty() {
        return Err(ApiError::Validation("No interview data".to_string()));
    }

    let raw = state
        .llm
        .generate(
            EVALUATOR_SYSTEM_PROMPT,
            &evaluation_prompt(&transcript),
            EVALUATION_TEMPERATURE,
        )
        .await
        .map_err(llm_error)?;

    let result = parse_evaluation(&raw).map_err(|e| ApiError::Parse(e.to_string()))?;

    // The evaluation is already computed; a persistence failure is
    // logged and the result is still returned to the caller.
    let stored = StoredEvaluation {
        interview_id: interview_id.clone(),
        transcript,
        result: result.clone(),
        evaluated_at: Utc::now(),
    };
    if let Err(e) = state.store.save_evaluation(stored).await {
        error!("Failed to persist evaluation for {}: {}", interview_id, e);
    } else {
        info!("Interview {} evaluated and saved", interview_id);
    }

    Ok(Json(serde_json::to_value(result).map_err(|e| ApiError::Parse(e.to_string()))?))
}

/// Most recent persisted evaluation for an interview. Available after
/// `evaluate` has run, independent of whether the session still exists.
async fn result(
    State(state): State<Arc<AppState>>,
    Path(interview_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stored = state
        .store
        .evaluation_for(&interview_id)
        .await
        .map_err(|e| ApiError::Persistence(e.to_string()))?
        .ok_or(ApiError::NotFound("evaluation"))?;

    Ok(Json(json!({
        "status": "success",
        "interviewId": stored.interview_id,
        "evaluation": stored.result,
        "transcript": stored.transcript,
        "evaluatedAt": stored.evaluated_at.to_rfc3339(),
    })))
}

async fn complete(
    State(state): State<Arc<AppState>>,
    Path(interview_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state
        .store
        .get(&interview_id)
        .await
        .map_err(|e| ApiError::Persistence(e.to_string()))?
        .ok_or(ApiError::NotFound("interview"))?;

    let mut video: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {}", e)))?
    {
        if field.name() == Some("video") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("could not read video field: {}", e)))?;
            video = Some(bytes.to_vec());
        }
    }
    let video = video.ok_or_else(|| ApiError::Validation("No video file provided".to_string()))?;
    if video.is_empty() {
        return Err(ApiError::Validation("Empty video file".to_string()));
    }

    // Upload first, then transition. The transition is applied whether
    // or not the upload succeeded: the completion gates link reuse,
    // while the recording is best-effort from the lifecycle's view.
    let filename = recording_filename(&record.candidate_name, &interview_id);
    let upload = match &state.uploader {
        Some(uploader) => match uploader.upload(video, &filename).await {
            Ok(file) => {
                info!("Uploaded recording {} for {}", file.id, interview_id);
                Ok(Some(file))
            }
            Err(e) => Err(format!("{}", e)),
        },
        None => {
            warn!("Uploader not configured; dropping recording for {}", interview_id);
            Ok(None)
        }
    };

    guard::complete(state.store.as_ref(), &interview_id, Utc::now()).await?;

    match upload {
        Ok(Some(file)) => Ok(Json(json!({
            "status": "success",
            "message": "Video uploaded successfully",
            "fileId": file.id,
            "fileLink": file.link,
        }))),
        Ok(None) => Ok(Json(json!({
            "status": "success",
            "message": "Interview completed; recording upload skipped (no uploader configured)",
        }))),
        Err(detail) => Err(ApiError::ExternalService {
            provider: "drive",
            detail: format!(
                "interview is marked completed, but the recording upload failed: {}",
                detail
            ),
        }),
    }
}

async fn cleanup(
    State(state): State<Arc<AppState>>,
    Path(interview_id): Path<String>,
) -> Json<serde_json::Value> {
    state.sessions.teardown(&interview_id).await;
    Json(json!({ "status": "success" }))
}

fn session_error(e: SessionError) -> ApiError {
    match e {
        SessionError::NotFound => ApiError::NotFound("interview session"),
        SessionError::AlreadyActive => ApiError::PreconditionFailed(DenyReason::AlreadyStarted),
    }
}

fn llm_error(e: LlmError) -> ApiError {
    ApiError::ExternalService {
        provider: "openai",
        detail: e.to_string(),
    }
}
