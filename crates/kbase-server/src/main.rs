mod config;

use std::sync::Arc;

use tracing::{info, warn};

use kbase_api::mail::{HttpMailer, LogMailer, Mailer};
use kbase_api::{AppState, AppStateInner};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kbase=debug,kbase_api=debug,kbase_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = kbase_db::Database::open(&config.db_path)?;

    let mailer: Arc<dyn Mailer> = match config.mail {
        Some(mail) => {
            info!("Delivering mail through {}", mail.api_url);
            Arc::new(HttpMailer::new(mail.api_url, mail.api_key, mail.from))
        }
        None => {
            warn!("KBASE_MAIL_API_URL not set; OTP mail will only be logged");
            Arc::new(LogMailer)
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        auth: config.auth,
        mailer,
    });
    let app = kbase_api::router(state);

    info!("Knowledge base listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable ({}), waiting for Ctrl+C", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
