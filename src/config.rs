use crate::auth::mail::LogMailer;
use crate::schemas::AppState;
use anyhow::Result;
use sea_orm::Database;
use std::sync::Arc;

/// Runtime configuration read from the environment.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Secret used both for signing access tokens and deriving
    /// confirmation codes.
    pub token_secret: String,
    /// Username that may never be registered or assigned.
    pub reserved_username: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            token_secret: std::env::var("TOKEN_SECRET")
                .unwrap_or_else(|_| "insecure-dev-secret".to_string()),
            reserved_username: std::env::var("RESERVED_USERNAME")
                .unwrap_or_else(|_| "me".to_string()),
        }
    }
}

/// Initialize application state with the given database URL
pub async fn initialize_app_state_with_url(database_url: &str) -> Result<AppState> {
    tracing::info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    Ok(AppState {
        db,
        config: AppConfig::from_env(),
        mailer: Arc::new(LogMailer),
    })
}
