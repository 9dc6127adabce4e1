use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use kbase_db::FeedbackOutcome;
use kbase_types::api::{Claims, FeedbackCountsResponse, SubmitFeedbackRequest};

use crate::convert;
use crate::error::{ApiError, ApiJson};
use crate::state::{AppState, db_call};

/// POST /feedback. One vote per user per article.
pub async fn submit_feedback(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<SubmitFeedbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let feedback_id = Uuid::new_v4().to_string();
    let article_id = req.article_id.to_string();
    let user_id = claims.sub.to_string();
    let vote = req.feedback;

    let outcome = db_call(&state, move |db| {
        db.submit_feedback(&feedback_id, &article_id, &user_id, vote, chrono::Utc::now())
    })
    .await?;

    match outcome {
        FeedbackOutcome::Recorded(row) => {
            info!("{} voted '{}' on article {}", claims.email, vote, req.article_id);
            Ok((StatusCode::CREATED, Json(convert::feedback(&row)?)))
        }
        FeedbackOutcome::AlreadyVoted => Err(ApiError::DuplicateVote),
        FeedbackOutcome::ArticleMissing => Err(ApiError::NotFound("Article")),
    }
}

pub async fn get_feedback_counts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let article_id = convert::parse_id(&id, "Article")?;

    let aid = article_id.to_string();
    let counts = db_call(&state, move |db| db.feedback_counts(&aid)).await?;

    Ok(Json(FeedbackCountsResponse {
        article_id,
        helpful: counts.helpful.max(0) as u64,
        not_helpful: counts.not_helpful.max(0) as u64,
    }))
}
