//! Recorded-media upload to Google Drive.
//!
//! One multipart upload per completed interview: a JSON metadata part
//! (filename, optional parent folder) followed by the media bytes. The
//! uploader's failure is reported to the caller but never rolls back a
//! completion transition that already happened.

use serde::Deserialize;
use serde_json::json;

const UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart&fields=id,webViewLink";

/// Handle to an uploaded file.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    #[serde(rename = "webViewLink")]
    pub link: Option<String>,
}

/// Google Drive uploader with a bearer access token.
#[derive(Clone)]
pub struct DriveUploader {
    client: reqwest::Client,
    access_token: String,
    folder_id: Option<String>,
}

impl DriveUploader {
    pub fn new(access_token: String, folder_id: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("panelist/0.1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            access_token,
            folder_id,
        }
    }

    /// Upload one file, returning its Drive id and view link.
    pub async fn upload(&self, bytes: Vec<u8>, filename: &str) -> anyhow::Result<UploadedFile> {
        let mut metadata = json!({ "name": filename });
        if let Some(folder) = &self.folder_id {
            metadata["parents"] = json!([folder]);
        }

        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata.to_string())
                    .mime_str("application/json")?,
            )
            .part(
                "media",
                reqwest::multipart::Part::bytes(bytes)
                    .file_name(filename.to_string())
                    .mime_str("video/webm")?,
            );

        let response = self
            .client
            .post(UPLOAD_URL)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Drive upload error {}: {}", status, body);
        }

        Ok(response.json().await?)
    }
}

/// Filename for a completed interview's recording.
pub fn recording_filename(candidate_name: &str, interview_id: &str) -> String {
    // Keep the name filesystem-friendly; Drive allows more but
    // downstream tooling may not.
    let safe_name: String = candidate_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("Interview_{}_{}.webm", safe_name, interview_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_sanitizes_candidate_name() {
        assert_eq!(
            recording_filename("Ada Lovelace", "iv-1"),
            "Interview_Ada_Lovelace_iv-1.webm"
        );
        assert_eq!(
            recording_filename("x/../etc", "iv-2"),
            "Interview_x____etc_iv-2.webm"
        );
    }
}
