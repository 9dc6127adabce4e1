//! Admin dashboard endpoints. All figures are derived from the store on each request.

use axum::{Json, extract::State, response::IntoResponse};

use kbase_db::queries::analytics::DEFAULT_LIMIT;
use kbase_types::api::{AnalyticsQuery, AnalyticsResponse, HelpfulArticle, KeywordCount, LeastHelpfulArticle};

use crate::convert;
use crate::error::{ApiError, ApiQuery};
use crate::middleware::AdminUser;
use crate::state::{AppState, db_call};

const MAX_LIMIT: u32 = 100;

fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

fn helpful(row: kbase_db::models::ArticleVoteCount) -> anyhow::Result<HelpfulArticle> {
    let (helpful_count, article) = convert::ranked_article(row)?;
    Ok(HelpfulArticle { helpful_count, article })
}

fn least_helpful_entry(row: kbase_db::models::ArticleVoteCount) -> anyhow::Result<LeastHelpfulArticle> {
    let (not_helpful_count, article) = convert::ranked_article(row)?;
    Ok(LeastHelpfulArticle { not_helpful_count, article })
}

pub async fn summary(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let s = db_call(&state, |db| db.analytics_summary()).await?;

    Ok(Json(AnalyticsResponse {
        total_searches: s.total_searches.max(0) as u64,
        total_articles: s.total_articles.max(0) as u64,
        total_feedbacks: s.total_feedbacks.max(0) as u64,
        avg_helpfulness: s.avg_helpfulness,
        most_searched: s.most_searched.into_iter().map(convert::keyword).collect(),
        most_helpful: s.most_helpful.into_iter().map(helpful).collect::<anyhow::Result<Vec<_>>>()?,
        least_helpful: s
            .least_helpful
            .into_iter()
            .map(least_helpful_entry)
            .collect::<anyhow::Result<Vec<_>>>()?,
    }))
}

pub async fn most_helpful(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = clamp_limit(query.limit);
    let rows = db_call(&state, move |db| db.most_helpful(limit)).await?;
    let ranking = rows.into_iter().map(helpful).collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(ranking))
}

pub async fn least_helpful(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = clamp_limit(query.limit);
    let rows = db_call(&state, move |db| db.least_helpful(limit)).await?;
    let ranking = rows
        .into_iter()
        .map(least_helpful_entry)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(ranking))
}

pub async fn most_searched(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = clamp_limit(query.limit);
    let rows = db_call(&state, move |db| db.most_searched(limit)).await?;
    Ok(Json(rows.into_iter().map(convert::keyword).collect::<Vec<KeywordCount>>()))
}
