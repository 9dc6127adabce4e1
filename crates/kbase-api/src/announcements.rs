use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use kbase_db::queries::announcements::NewAnnouncement;
use kbase_types::api::{CreateAnnouncementRequest, MessageResponse};

use crate::convert;
use crate::error::{ApiError, ApiJson};
use crate::middleware::AdminUser;
use crate::state::{AppState, db_call};

pub async fn list_announcements(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = db_call(&state, |db| db.list_announcements()).await?;
    let announcements = rows
        .into_iter()
        .map(convert::announcement)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(announcements))
}

pub async fn create_announcement(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(req): ApiJson<CreateAnnouncementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    let content = req.content.trim().to_string();
    if title.is_empty() || content.is_empty() {
        return Err(ApiError::validation("Title and content are required"));
    }

    let id = Uuid::new_v4().to_string();
    let author = admin.sub.to_string();
    let (priority, date) = (req.priority, req.date);
    let row = db_call(&state, move |db| {
        let announcement = NewAnnouncement {
            title: &title,
            content: &content,
            priority,
            date,
        };
        db.create_announcement(&id, &author, &announcement, chrono::Utc::now())
    })
    .await?;

    info!("{} posted {} priority announcement '{}'", admin.email, priority, row.title);
    Ok((StatusCode::CREATED, Json(convert::announcement(row)?)))
}

pub async fn delete_announcement(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = convert::parse_id(&id, "Announcement")?.to_string();
    if !db_call(&state, move |db| db.delete_announcement(&id)).await? {
        return Err(ApiError::NotFound("Announcement"));
    }
    Ok(Json(MessageResponse::new("Announcement removed successfully")))
}
