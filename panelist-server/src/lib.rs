//! Panelist server: timed, single-use remote interview sessions.
//!
//! The lifecycle guard and the record store's atomic compare-and-set
//! are the heart of the service; everything else (routing, mail, media
//! upload, LLM calls) hangs off them.

pub mod config;
pub mod error;
pub mod guard;
pub mod mailer;
pub mod routes;
pub mod session;
pub mod store;
pub mod uploader;
pub mod window;

use std::sync::Arc;

use panelist_core::OpenAiClient;

use mailer::MailClient;
use session::SessionStore;
use store::InterviewStore;
use uploader::DriveUploader;

/// Shared application state handed to every handler.
pub struct AppState {
    pub store: Arc<dyn InterviewStore>,
    pub sessions: Arc<SessionStore>,
    pub llm: OpenAiClient,
    pub mailer: Option<MailClient>,
    pub uploader: Option<DriveUploader>,
    /// Base URL interview links are built from.
    pub frontend_url: String,
}

impl AppState {
    pub fn interview_link(&self, interview_id: &str) -> String {
        format!("{}/interview?id={}", self.frontend_url, interview_id)
    }
}
