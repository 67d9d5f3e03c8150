use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};

use panelist_core::OpenAiClient;
use panelist_server::config::Config;
use panelist_server::mailer::MailClient;
use panelist_server::routes::api_router;
use panelist_server::session::{reaper_loop, SessionStore};
use panelist_server::store::SqliteInterviewStore;
use panelist_server::uploader::DriveUploader;
use panelist_server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting panelist interview service");

    let config = Config::from_env()?;

    let llm = match &config.openai_model {
        Some(model) => OpenAiClient::with_model(config.openai_api_key.clone(), model.clone()),
        None => OpenAiClient::new(config.openai_api_key.clone()),
    };

    let mailer = match &config.mail {
        Some(mail) => Some(MailClient::new(
            mail.api_url.clone(),
            mail.api_key.clone(),
            mail.from.clone(),
        )),
        None => {
            warn!("Mail not configured; interview invitations will not be sent");
            None
        }
    };

    let uploader = match &config.drive {
        Some(drive) => Some(DriveUploader::new(
            drive.access_token.clone(),
            drive.folder_id.clone(),
        )),
        None => {
            warn!("Drive not configured; interview recordings will not be uploaded");
            None
        }
    };

    let db_path = config.state_dir.join("panelist.db");
    info!("Using interview database: {}", db_path.display());
    let store = Arc::new(
        SqliteInterviewStore::new(&db_path).expect("Failed to initialize SQLite database"),
    );

    let sessions = Arc::new(SessionStore::new());

    let state = Arc::new(AppState {
        store: store.clone(),
        sessions: sessions.clone(),
        llm,
        mailer,
        uploader,
        frontend_url: config.frontend_url.clone(),
    });

    // Sweep abandoned sessions once their interview window has long closed.
    tokio::spawn(async move {
        reaper_loop(sessions, store).await;
    });

    let app = api_router(state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
