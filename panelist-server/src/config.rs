use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Mail API settings. Only present when all three variables are set.
#[derive(Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

/// Drive upload settings.
#[derive(Clone)]
pub struct DriveConfig {
    pub access_token: String,
    pub folder_id: Option<String>,
}

#[derive(Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_model: Option<String>,
    pub port: u16,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    /// Base URL the interview link is built from.
    pub frontend_url: String,
    /// Invitation mail delivery. Optional: unset disables sending.
    pub mail: Option<MailConfig>,
    /// Recorded-media upload. Optional: unset disables uploads.
    pub drive: Option<DriveConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let openai_api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable is required")?;

        let openai_model = env::var("OPENAI_MODEL").ok().filter(|s| !s.trim().is_empty());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let mail = mail_config_from_parts(
            env::var("MAIL_API_URL").ok(),
            env::var("MAIL_API_KEY").ok(),
            env::var("MAIL_FROM").ok(),
        );

        let drive = env::var("DRIVE_ACCESS_TOKEN")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|access_token| DriveConfig {
                access_token,
                folder_id: env::var("DRIVE_FOLDER_ID").ok().filter(|s| !s.trim().is_empty()),
            });

        Ok(Config {
            openai_api_key,
            openai_model,
            port,
            state_dir,
            frontend_url,
            mail,
            drive,
        })
    }
}

/// Assemble a `MailConfig` only when every part is present and
/// non-blank. A partially configured mailer would fail every send, so
/// it is treated as unset.
pub fn mail_config_from_parts(
    api_url: Option<String>,
    api_key: Option<String>,
    from: Option<String>,
) -> Option<MailConfig> {
    let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    match (present(api_url), present(api_key), present(from)) {
        (Some(api_url), Some(api_key), Some(from)) => Some(MailConfig {
            api_url,
            api_key,
            from,
        }),
        _ => None,
    }
}
