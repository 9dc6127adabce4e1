use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use kbase_db::models::{ArticlePatch, NewArticle};
use kbase_db::queries::articles::ArticleFilter;
use kbase_types::api::{ArticleQuery, Claims, CreateArticleRequest, MessageResponse, UpdateArticleRequest};
use kbase_types::models::ALL_CATEGORIES;

use crate::convert;
use crate::error::{ApiError, ApiJson, ApiQuery};
use crate::middleware::AdminUser;
use crate::state::{AppState, db_call};

/// Empty strings count as "not provided".
fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required(value: &str, field: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Provided fields of a patch may not be blank.
fn patched(value: Option<String>, field: &str) -> Result<Option<String>, ApiError> {
    value.map(|v| required(&v, field)).transpose()
}

pub async fn list_articles(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<ArticleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let search = present(query.search);
    let category = present(query.category).filter(|c| c != ALL_CATEGORIES);

    let user_id = claims.sub.to_string();
    let rows = db_call(&state, move |db| {
        // Every search term and category filter leaves a trace for analytics.
        let now = chrono::Utc::now();
        for keyword in [search.as_deref(), category.as_deref()].into_iter().flatten() {
            if let Err(e) = db.log_search(keyword, Some(&user_id), now) {
                warn!("Failed to log search '{}': {:#}", keyword, e);
            }
        }

        db.list_articles(&ArticleFilter {
            title_contains: search.as_deref(),
            category: category.as_deref(),
        })
    })
    .await?;

    Ok(Json(convert::articles(rows)?))
}

pub async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = convert::parse_id(&id, "Article")?.to_string();
    let row = db_call(&state, move |db| db.get_article(&id))
        .await?
        .ok_or(ApiError::NotFound("Article"))?;

    Ok(Json(convert::article(row)?))
}

pub async fn create_article(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(req): ApiJson<CreateArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = required(&req.title, "Title")?;
    let category = required(&req.category, "Category")?;
    let content = required(&req.content, "Content")?;

    let article_id = Uuid::new_v4().to_string();
    let author = admin.sub.to_string();
    let row = db_call(&state, move |db| {
        let article = NewArticle {
            title: &title,
            category: &category,
            content: &content,
            tags: &req.tags,
        };
        db.create_article(&article_id, &author, &article, chrono::Utc::now())
    })
    .await?;

    info!("{} created article '{}'", admin.email, row.title);
    Ok((StatusCode::CREATED, Json(convert::article(row)?)))
}

pub async fn update_article(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = convert::parse_id(&id, "Article")?.to_string();
    let patch = ArticlePatch {
        title: patched(req.title, "Title")?,
        category: patched(req.category, "Category")?,
        content: patched(req.content, "Content")?,
        tags: req.tags,
    };

    let row = db_call(&state, move |db| db.update_article(&id, &patch, chrono::Utc::now()))
        .await?
        .ok_or(ApiError::NotFound("Article"))?;

    info!("{} updated article {}", admin.email, row.id);
    Ok(Json(convert::article(row)?))
}

pub async fn delete_article(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = convert::parse_id(&id, "Article")?.to_string();
    let aid = id.clone();
    if !db_call(&state, move |db| db.delete_article(&aid)).await? {
        return Err(ApiError::NotFound("Article"));
    }

    info!("{} deleted article {}", admin.email, id);
    Ok(Json(MessageResponse::new("Article removed successfully")))
}
