//! Invitation mail delivery through an HTTP mail API.
//!
//! Fire-and-forget from the scheduler's perspective: a send failure is
//! logged and never aborts the scheduling request. The whole subsystem
//! is optional; without mail configuration the service schedules
//! interviews and simply skips the invitation.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Client for a JSON mail API (bearer-authenticated POST).
#[derive(Clone)]
pub struct MailClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl MailClient {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("panelist/0.1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_url,
            api_key,
            from,
        }
    }

    /// Send one HTML email.
    pub async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        let request = SendRequest {
            from: &self.from,
            to,
            subject,
            html,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("mail API error {}: {}", status, body);
        }

        Ok(())
    }
}

pub const INVITATION_SUBJECT: &str = "Your Interview Schedule - Action Required";

/// Render one window boundary for the invitation. Display-only; all
/// comparisons elsewhere stay in UTC.
fn display_time(ts: DateTime<Utc>) -> String {
    ts.format("%d %b %Y, %H:%M UTC").to_string()
}

/// Render the invitation body.
pub fn invitation_body(
    candidate_name: &str,
    interview_link: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> String {
    format!(
        "<html><body style=\"font-family: Arial, sans-serif;\">\
         <h2>Interview Invitation</h2>\
         <p>Hello {name},</p>\
         <p>Your interview has been scheduled. Use the link below to join \
         during the scheduled window. The link is single-use.</p>\
         <p><a href=\"{link}\">Join Interview</a></p>\
         <ul>\
           <li>Start: {start}</li>\
           <li>End: {end}</li>\
         </ul>\
         <p>Join a few minutes early, check your audio, and do not refresh \
         the page during the interview.</p>\
         </body></html>",
        name = candidate_name,
        link = interview_link,
        start = display_time(start_time),
        end = display_time(end_time),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn invitation_embeds_link_and_utc_window() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap();
        let body = invitation_body("Ada", "http://example.com/interview?id=x", start, end);

        assert!(body.contains("Hello Ada"));
        assert!(body.contains("http://example.com/interview?id=x"));
        assert!(body.contains("01 Mar 2026, 10:00 UTC"));
        assert!(body.contains("01 Mar 2026, 11:00 UTC"));
    }
}
