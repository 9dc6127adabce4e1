use std::sync::Arc;

use chrono::Duration;
use tracing::error;

use kbase_db::Database;

use crate::error::ApiError;
use crate::mail::Mailer;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub auth: AuthSettings,
    pub mailer: Arc<dyn Mailer>,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub otp_ttl: Duration,
    /// When set, registration must present the ticket returned by register-OTP verification.
    pub require_email_verification: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-change-me".into(),
            token_ttl: Duration::days(7),
            otp_ttl: Duration::minutes(10),
            require_email_verification: false,
        }
    }
}

/// Run a store call off the async runtime.
pub async fn db_call<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::Internal)
}
